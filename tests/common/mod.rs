//! Shared demo domain for the end-to-end tests: a greeting service that
//! loads persons through a DAO, with a sampled wrapper standing in as the
//! interception mechanism.

// Not every test binary uses the whole domain.
#![allow(dead_code)]

use callsample::{
    Bean, CodecRegistry, Invocation, MethodIdentity, PersistentBean, Result, Sampler, Value,
};
use chrono::{NaiveDate, NaiveDateTime};
use std::cell::RefCell;
use std::rc::Rc;

pub const LOAD_PERSON: MethodIdentity =
    MethodIdentity::new("PersonDao", "load_person", &["i32"], "Person");
pub const LOAD_PERSON_BY_ID: MethodIdentity =
    MethodIdentity::new("PersonDao", "load_person_by_id", &["PersonId"], "Person");

/// A simple bean describing a person.
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub name: String,
    pub birthday: Option<NaiveDateTime>,
}

impl Person {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            birthday: None,
        }
    }

    pub fn with_birthday(name: &str, birthday: NaiveDateTime) -> Self {
        Self {
            name: name.to_string(),
            birthday: Some(birthday),
        }
    }
}

impl Bean for Person {
    fn to_fields(&self, codecs: &CodecRegistry) -> Result<PersistentBean> {
        let mut bean = PersistentBean::new();
        bean.put("name", codecs.convert_of(&self.name)?);
        match &self.birthday {
            Some(birthday) => bean.put("birthday", codecs.convert_of(birthday)?),
            None => bean.put("birthday", Value::Null),
        }
        Ok(bean)
    }

    fn from_fields(bean: &PersistentBean, codecs: &CodecRegistry) -> Result<Self> {
        let name = match bean.get("name") {
            Some(value) => codecs.revert_as::<String>(value)?,
            None => String::new(),
        };
        let birthday = match bean.get("birthday") {
            Some(Value::Null) | None => None,
            Some(value) => Some(codecs.revert_as::<NaiveDateTime>(value)?),
        };
        Ok(Person { name, birthday })
    }
}

/// An id wrapper that deliberately has no equality, so tests can exercise
/// custom comparators and the missing-equality error.
#[derive(Debug, Clone)]
pub struct PersonId(pub i32);

impl Bean for PersonId {
    fn to_fields(&self, codecs: &CodecRegistry) -> Result<PersistentBean> {
        let mut bean = PersistentBean::new();
        bean.put("id", codecs.convert_of(&self.0)?);
        Ok(bean)
    }

    fn from_fields(bean: &PersistentBean, codecs: &CodecRegistry) -> Result<Self> {
        let id = match bean.get("id") {
            Some(value) => codecs.revert_as::<i32>(value)?,
            None => 0,
        };
        Ok(PersonId(id))
    }
}

pub fn geordis_birthday() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2335, 2, 16)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// The collaborator whose methods get stubbed.
pub trait PersonDao {
    fn load_person(&self, person_id: i32) -> Person;
    fn load_person_by_id(&self, person_id: &PersonId) -> Person;
}

/// Simulates a DAO that would load persons from a database.
pub struct PersonDaoImpl;

impl PersonDao for PersonDaoImpl {
    fn load_person(&self, _person_id: i32) -> Person {
        Person::with_birthday("Geordi La Forge", geordis_birthday())
    }

    fn load_person_by_id(&self, _person_id: &PersonId) -> Person {
        Person::with_birthday("Geordi La Forge", geordis_birthday())
    }
}

/// A DAO that must never be reached; proves that replayed calls do not
/// touch the original implementation.
pub struct UnreachableDao;

impl PersonDao for UnreachableDao {
    fn load_person(&self, _person_id: i32) -> Person {
        panic!("the original implementation must not be invoked during replay");
    }

    fn load_person_by_id(&self, _person_id: &PersonId) -> Person {
        panic!("the original implementation must not be invoked during replay");
    }
}

/// The interception wrapper: forwards every call to the engine together
/// with a thunk for the original implementation.
pub struct SampledPersonDao<D> {
    sampler: Rc<RefCell<Sampler>>,
    inner: D,
}

impl<D> SampledPersonDao<D> {
    pub fn new(sampler: Rc<RefCell<Sampler>>, inner: D) -> Self {
        Self { sampler, inner }
    }
}

impl<D: PersonDao> PersonDao for SampledPersonDao<D> {
    fn load_person(&self, person_id: i32) -> Person {
        self.sampler
            .borrow()
            .call(Invocation::of(&LOAD_PERSON).arg(person_id), || {
                self.inner.load_person(person_id)
            })
            .unwrap()
    }

    fn load_person_by_id(&self, person_id: &PersonId) -> Person {
        self.sampler
            .borrow()
            .call(
                Invocation::of(&LOAD_PERSON_BY_ID).arg(person_id.clone()),
                || self.inner.load_person_by_id(person_id),
            )
            .unwrap()
    }
}

/// Indirection between the greeting service and the DAO, so tests stub an
/// object that is not directly reachable from the test case.
pub struct PersonService<D> {
    dao: D,
}

impl<D: PersonDao> PersonService<D> {
    pub fn new(dao: D) -> Self {
        Self { dao }
    }

    pub fn get_name(&self, person_id: i32) -> String {
        self.dao.load_person(person_id).name
    }

    pub fn get_name_by_id(&self, person_id: &PersonId) -> String {
        self.dao.load_person_by_id(person_id).name
    }

    pub fn get_birthday(&self, person_id: i32) -> Option<NaiveDateTime> {
        self.dao.load_person(person_id).birthday
    }
}

/// Creates greeting messages for a person identified by an id.
pub struct GreetingService<D> {
    persons: PersonService<D>,
}

impl<D: PersonDao> GreetingService<D> {
    pub fn new(persons: PersonService<D>) -> Self {
        Self { persons }
    }

    pub fn create_greeting(&self, person_id: i32) -> String {
        format!("Hello {}!", self.persons.get_name(person_id))
    }

    pub fn create_greeting_by_id(&self, person_id: &PersonId) -> String {
        format!("Hello {}!", self.persons.get_name_by_id(person_id))
    }

    pub fn create_birthday_greeting(&self, person_id: i32) -> String {
        match self.persons.get_birthday(person_id) {
            Some(birthday) => format!(
                "{}'s Birthday: {}",
                self.persons.get_name(person_id),
                birthday.format("%d.%m.%Y")
            ),
            None => format!("{} has no recorded birthday", self.persons.get_name(person_id)),
        }
    }
}

/// Register the demo domain types with the engine's codec registry.
pub fn register_domain(codecs: &mut CodecRegistry) {
    codecs.register_bean::<Person>();
    codecs.register_bean_opaque::<PersonId>();
}

/// Wire the full compound against a shared sampler, the way a test's
/// injection setup would.
pub fn greeting_service<D: PersonDao>(
    sampler: &Rc<RefCell<Sampler>>,
    dao: D,
) -> GreetingService<SampledPersonDao<D>> {
    let sampled = SampledPersonDao::new(Rc::clone(sampler), dao);
    GreetingService::new(PersonService::new(sampled))
}

/// Fresh sampler with the demo domain registered.
pub fn new_sampler() -> Rc<RefCell<Sampler>> {
    let mut sampler = Sampler::new();
    register_domain(sampler.codecs_mut());
    Rc::new(RefCell::new(sampler))
}
