//! Per-request state: the caller and the caches that must never outlive
//! one call.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDateTime;

use crate::acl::resolver::AclCache;
use crate::models::User;

/// Created fresh for every service call; holds the current user and the
/// read-through caches for ownership, ACL id sets and readable attributes.
#[derive(Debug)]
pub struct RequestContext {
    user: User,
    now: NaiveDateTime,
    acl: AclCache,
    ownership: RefCell<HashMap<(String, String, String), bool>>,
    readable_attributes: RefCell<HashMap<String, BTreeSet<String>>>,
}

impl RequestContext {
    pub fn new(user: User) -> Self {
        Self {
            user,
            now: chrono::Local::now().naive_local(),
            acl: AclCache::new(),
            ownership: RefCell::new(HashMap::new()),
            readable_attributes: RefCell::new(HashMap::new()),
        }
    }

    /// Pin the clock used for temporary ownership expiry.
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    pub fn acl(&self) -> &AclCache {
        &self.acl
    }

    pub(crate) fn cached_ownership(&self, te_uid: &str, program_uid: &str) -> Option<bool> {
        self.ownership
            .borrow()
            .get(&(self.user.uid.clone(), te_uid.to_string(), program_uid.to_string()))
            .copied()
    }

    pub(crate) fn cache_ownership(&self, te_uid: &str, program_uid: &str, allowed: bool) {
        self.ownership.borrow_mut().insert(
            (self.user.uid.clone(), te_uid.to_string(), program_uid.to_string()),
            allowed,
        );
    }

    pub(crate) fn cached_readable_attributes(&self, program_uid: &str) -> Option<BTreeSet<String>> {
        self.readable_attributes.borrow().get(program_uid).cloned()
    }

    pub(crate) fn cache_readable_attributes(&self, program_uid: &str, attributes: BTreeSet<String>) {
        self.readable_attributes
            .borrow_mut()
            .insert(program_uid.to_string(), attributes);
    }
}
