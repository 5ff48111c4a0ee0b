//! End-to-end stubbing: declare samples, call through the compound, clear.

mod common;

use callsample::{ArgumentMatcher, Result, SampleDefinition, Sampler, SamplerFixture};
use common::{
    greeting_service, new_sampler, Person, PersonDaoImpl, PersonId, LOAD_PERSON,
    LOAD_PERSON_BY_ID,
};

#[test]
fn greeting_uses_the_stub_until_cleared() {
    let sampler = new_sampler();
    let greetings = greeting_service(&sampler, PersonDaoImpl);

    // From now on, load_person(1) returns a person named "Sarek", wherever
    // in the object tree the DAO is called.
    sampler
        .borrow_mut()
        .define(
            SampleDefinition::for_method(&LOAD_PERSON)
                .arg(ArgumentMatcher::equal_to(1i32))
                .returns(Person::new("Sarek")),
        )
        .unwrap();

    assert_eq!(greetings.create_greeting(1), "Hello Sarek!");

    // Removing all samples restores the unstubbed behavior.
    sampler.borrow_mut().clear();
    assert_eq!(greetings.create_greeting(1), "Hello Geordi La Forge!");
}

#[test]
fn stub_applies_only_to_matching_arguments() {
    let sampler = new_sampler();
    let greetings = greeting_service(&sampler, PersonDaoImpl);

    sampler
        .borrow_mut()
        .define(
            SampleDefinition::for_method(&LOAD_PERSON)
                .arg(ArgumentMatcher::equal_to(1i32))
                .returns(Person::new("Sarek")),
        )
        .unwrap();

    assert_eq!(greetings.create_greeting(1), "Hello Sarek!");
    assert_eq!(greetings.create_greeting(2), "Hello Geordi La Forge!");
}

#[test]
fn first_declared_sample_wins_over_a_later_structural_match() {
    let sampler = new_sampler();
    let greetings = greeting_service(&sampler, PersonDaoImpl);

    {
        let mut sampler = sampler.borrow_mut();
        sampler
            .define(
                SampleDefinition::for_method(&LOAD_PERSON)
                    .arg(ArgumentMatcher::equal_to(1i32))
                    .returns(Person::new("Sarek")),
            )
            .unwrap();
        // The wildcard also matches 1, but is declared later.
        sampler
            .define(
                SampleDefinition::for_method(&LOAD_PERSON)
                    .arg(ArgumentMatcher::any())
                    .returns(Person::new("Worf")),
            )
            .unwrap();
    }

    assert_eq!(greetings.create_greeting(1), "Hello Sarek!");
    assert_eq!(greetings.create_greeting(7), "Hello Worf!");
}

#[test]
fn wildcard_of_type_stubs_every_call() {
    let sampler = new_sampler();
    let greetings = greeting_service(&sampler, PersonDaoImpl);

    sampler
        .borrow_mut()
        .define(
            SampleDefinition::for_method(&LOAD_PERSON)
                .arg(ArgumentMatcher::any_of::<i32>())
                .returns(Person::new("Sarek")),
        )
        .unwrap();

    assert_eq!(greetings.create_greeting(1), "Hello Sarek!");
    assert_eq!(greetings.create_greeting(42), "Hello Sarek!");
}

#[test]
fn custom_comparison_stubs_a_type_without_equality() {
    let sampler = new_sampler();
    let greetings = greeting_service(&sampler, PersonDaoImpl);

    // PersonId has no equality; the sample declares its own comparison.
    sampler
        .borrow_mut()
        .define(
            SampleDefinition::for_method(&LOAD_PERSON_BY_ID)
                .arg(ArgumentMatcher::matching(PersonId(1), |left, right| {
                    left.0 == right.0
                }))
                .returns(Person::new("Sarek")),
        )
        .unwrap();

    assert_eq!(greetings.create_greeting_by_id(&PersonId(1)), "Hello Sarek!");
    assert_eq!(
        greetings.create_greeting_by_id(&PersonId(2)),
        "Hello Geordi La Forge!"
    );
}

#[test]
fn activating_a_fixture_replaces_earlier_declarations() {
    struct SarekFixture;

    impl SamplerFixture for SarekFixture {
        fn define_samplers(&self, sampler: &mut Sampler) -> Result<()> {
            sampler.define(
                SampleDefinition::for_method(&LOAD_PERSON)
                    .arg(ArgumentMatcher::any_of::<i32>())
                    .returns(Person::new("Sarek")),
            )
        }
    }

    let sampler = new_sampler();
    let greetings = greeting_service(&sampler, PersonDaoImpl);

    sampler
        .borrow_mut()
        .define(
            SampleDefinition::for_method(&LOAD_PERSON)
                .arg(ArgumentMatcher::any_of::<i32>())
                .returns(Person::new("Stale")),
        )
        .unwrap();

    sampler.borrow_mut().activate(&SarekFixture).unwrap();
    assert_eq!(greetings.create_greeting(1), "Hello Sarek!");
}

#[test]
fn clear_with_no_state_is_harmless() {
    let sampler = new_sampler();
    let greetings = greeting_service(&sampler, PersonDaoImpl);

    sampler.borrow_mut().clear();
    sampler.borrow_mut().clear();
    assert!(sampler.borrow().is_empty());
    assert_eq!(greetings.create_greeting(1), "Hello Geordi La Forge!");
}
