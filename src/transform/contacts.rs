//! Contact object construction from source people.

use crate::source::models::{Project, Resource, ResourceType};
use crate::target::models::Contact;

/// The project owner as a contact, when the project names one.
pub fn project_owner_contact(project: &Project) -> Option<Contact> {
    Contact::new(project.owner.clone(), project.owner_email.clone())
}

/// A work resource as a contact. Non-people resources never become contacts;
/// a work resource lacking an email still emits with name only.
pub fn resource_contact(resource: &Resource) -> Option<Contact> {
    if resource.resource_type != ResourceType::Work {
        return None;
    }
    Contact::new(Some(resource.name.clone()), resource.email.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn work_resource(name: &str, email: Option<&str>) -> Resource {
        Resource {
            id: "r1".into(),
            name: name.into(),
            email: email.map(String::from),
            resource_type: ResourceType::Work,
            max_units: None,
            standard_rate: None,
            overtime_rate: None,
            cost_per_use: None,
            department: None,
            code: None,
            is_active: true,
            is_generic: false,
            created_at: None,
            modified_at: None,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_work_resource_with_email() {
        let c = resource_contact(&work_resource("Jane", Some("j@x.com"))).unwrap();
        assert_eq!(c.name.as_deref(), Some("Jane"));
        assert_eq!(c.email.as_deref(), Some("j@x.com"));
    }

    #[test]
    fn test_work_resource_name_only_still_emits() {
        let c = resource_contact(&work_resource("Jane", None)).unwrap();
        assert_eq!(c.name.as_deref(), Some("Jane"));
        assert!(c.email.is_none());
    }

    #[test]
    fn test_material_resource_is_not_a_contact() {
        let mut r = work_resource("Crane A", None);
        r.resource_type = ResourceType::Material;
        assert!(resource_contact(&r).is_none());
    }
}
