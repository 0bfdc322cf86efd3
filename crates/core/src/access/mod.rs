//! Document access checks.
//!
//! A user reaches a document through ownership, admin rights in the
//! document's organization, an active per-document grant, or the
//! capabilities of the container holding it.

use crate::domain::authorization::{Authorization, PermissionLevel};
use crate::domain::document::{Container, Document};
use crate::domain::user::User;

/// What a container lets its members do with the documents it holds.
pub trait DocumentContainer {
    fn can_read_documents(&self, user: &User) -> bool;
    fn can_manage_documents(&self, user: &User) -> bool;
}

impl DocumentContainer for Container {
    fn can_read_documents(&self, user: &User) -> bool {
        user.belongs_to(self.organization_id())
    }

    fn can_manage_documents(&self, user: &User) -> bool {
        match self {
            Container::Space { organization_id, .. } => {
                user.admin && user.belongs_to(organization_id)
            }
            Container::Project { organization_id, manager_id, .. } => {
                &user.id == manager_id || (user.admin && user.belongs_to(organization_id))
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DocumentAccess<'a> {
    document: &'a Document,
    grants: &'a [Authorization],
}

impl<'a> DocumentAccess<'a> {
    /// `grants` may contain grants for other documents and revoked grants;
    /// neither counts.
    pub fn new(document: &'a Document, grants: &'a [Authorization]) -> Self {
        Self { document, grants }
    }

    pub fn can_read(&self, user: &User) -> bool {
        self.is_owner_or_admin(user)
            || self.has_grant(user, PermissionLevel::Read)
            || self.document.container.can_read_documents(user)
    }

    pub fn can_request_validation(&self, user: &User) -> bool {
        self.is_owner_or_admin(user)
            || self.has_grant(user, PermissionLevel::Write)
            || self.document.container.can_manage_documents(user)
    }

    pub fn can_validate(&self, user: &User) -> bool {
        self.is_owner_or_admin(user) || self.has_grant(user, PermissionLevel::Validate)
    }

    /// The admin flag only reaches documents of the admin's own organization.
    pub fn can_administer(&self, user: &User) -> bool {
        user.admin && user.belongs_to(self.document.container.organization_id())
    }

    fn is_owner_or_admin(&self, user: &User) -> bool {
        self.can_administer(user) || self.document.is_owned_by(&user.id)
    }

    fn has_grant(&self, user: &User, required: PermissionLevel) -> bool {
        self.grants
            .iter()
            .filter(|grant| grant.document_id == self.document.id)
            .any(|grant| grant.grants(&user.id, required))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{DocumentAccess, DocumentContainer};
    use crate::domain::authorization::{Authorization, AuthorizationId, PermissionLevel};
    use crate::domain::document::{Container, Document, DocumentId, DocumentStatus};
    use crate::domain::user::{OrganizationId, User, UserId};

    fn user(id: &str, organization: &str, admin: bool) -> User {
        User {
            id: UserId(id.to_owned()),
            full_name: id.to_owned(),
            email: format!("{id}@example.com"),
            organization_id: OrganizationId(organization.to_owned()),
            admin,
        }
    }

    fn document(container: Container) -> Document {
        Document {
            id: DocumentId("DOC-1".to_owned()),
            title: "Contract".to_owned(),
            status: DocumentStatus::Published,
            uploaded_by: UserId("owner".to_owned()),
            container,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn space() -> Container {
        Container::Space {
            id: "space-1".to_owned(),
            organization_id: OrganizationId("org-1".to_owned()),
        }
    }

    fn grant(user_id: &str, level: PermissionLevel) -> Authorization {
        Authorization {
            id: AuthorizationId(format!("AUTH-{user_id}")),
            document_id: DocumentId("DOC-1".to_owned()),
            user_id: UserId(user_id.to_owned()),
            permission_level: level,
            granted_by: UserId("owner".to_owned()),
            granted_at: Utc::now(),
            comment: None,
            revoked_by: None,
            revoked_at: None,
        }
    }

    #[test]
    fn owner_and_admin_can_do_everything() {
        let document = document(space());
        let access = DocumentAccess::new(&document, &[]);
        let owner = user("owner", "org-2", false);
        let admin = user("admin", "org-1", true);

        for actor in [&owner, &admin] {
            assert!(access.can_read(actor));
            assert!(access.can_request_validation(actor));
            assert!(access.can_validate(actor));
        }
        assert!(access.can_administer(&admin));
        assert!(!access.can_administer(&owner));
    }

    #[test]
    fn admins_of_another_organization_get_nothing_from_the_flag() {
        let document = document(space());
        let access = DocumentAccess::new(&document, &[]);
        let foreign_admin = user("foreign-admin", "org-2", true);

        assert!(!access.can_administer(&foreign_admin));
        assert!(!access.can_read(&foreign_admin));
        assert!(!access.can_request_validation(&foreign_admin));
        assert!(!access.can_validate(&foreign_admin));

        let grants = vec![grant("foreign-admin", PermissionLevel::Validate)];
        let granted = DocumentAccess::new(&document, &grants);
        assert!(granted.can_validate(&foreign_admin));
        assert!(!granted.can_request_validation(&foreign_admin));
    }

    #[test]
    fn grants_follow_permission_ordering() {
        let document = document(space());
        let grants = vec![
            grant("writer", PermissionLevel::Write),
            grant("checker", PermissionLevel::Validate),
        ];
        let access = DocumentAccess::new(&document, &grants);
        let writer = user("writer", "org-2", false);
        let checker = user("checker", "org-2", false);

        assert!(access.can_request_validation(&writer));
        assert!(!access.can_validate(&writer));
        assert!(access.can_validate(&checker));
        assert!(access.can_read(&checker));
    }

    #[test]
    fn revoked_grants_no_longer_count() {
        let document = document(space());
        let mut revoked = grant("checker", PermissionLevel::Validate);
        assert!(revoked.revoke(UserId("owner".to_owned()), Utc::now()));
        assert!(!revoked.revoke(UserId("owner".to_owned()), Utc::now()));
        let grants = vec![revoked];
        let access = DocumentAccess::new(&document, &grants);

        assert!(!access.can_validate(&user("checker", "org-2", false)));
    }

    #[test]
    fn container_membership_grants_read_but_not_validate() {
        let document = document(space());
        let access = DocumentAccess::new(&document, &[]);
        let member = user("member", "org-1", false);
        let outsider = user("outsider", "org-2", false);

        assert!(access.can_read(&member));
        assert!(!access.can_request_validation(&member));
        assert!(!access.can_validate(&member));
        assert!(!access.can_read(&outsider));
    }

    #[test]
    fn project_manager_can_manage_project_documents() {
        let project = Container::Project {
            id: "project-1".to_owned(),
            organization_id: OrganizationId("org-1".to_owned()),
            manager_id: UserId("manager".to_owned()),
        };
        let manager = user("manager", "org-1", false);
        assert!(project.can_manage_documents(&manager));

        let document = document(project);
        let access = DocumentAccess::new(&document, &[]);
        assert!(access.can_request_validation(&manager));
        assert!(!access.can_validate(&manager));
    }
}
