//! Tracked entity attributes a user may read through program sharing.

use std::collections::BTreeSet;

use super::context::RequestContext;
use crate::acl::resolver::AclResolver;
use crate::error::TrackerError;
use crate::models::Program;

pub struct AttributeService<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: AclResolver + ?Sized> AttributeService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Union of the attribute UIDs of every data-readable program in `programs`.
    pub fn get_all_user_readable_attributes(
        &self,
        ctx: &RequestContext,
        programs: &[Program],
    ) -> Result<BTreeSet<String>, TrackerError> {
        let mut readable = BTreeSet::new();
        for program in programs {
            if let Some(cached) = ctx.cached_readable_attributes(&program.uid) {
                readable.extend(cached);
                continue;
            }
            let attributes: BTreeSet<String> =
                if ctx.acl().can_read_program(self.store, ctx.user(), program.id)? {
                    program.attributes.iter().cloned().collect()
                } else {
                    BTreeSet::new()
                };
            ctx.cache_readable_attributes(&program.uid, attributes.clone());
            readable.extend(attributes);
        }
        Ok(readable)
    }
}
