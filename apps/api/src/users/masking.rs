//! What one user may see of another.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::enums::{PrivacySetting, Role};
use crate::models::user::{PublicUser, User};

/// Intern-profile fields companies never see.
const HIDDEN_INTERN_FIELDS: &[&str] = &["gpa", "resume", "portfolio"];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserStub {
    pub id: Uuid,
    pub role: Role,
    pub privacy_setting: PrivacySetting,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum UserView {
    Full(PublicUser),
    Stub(UserStub),
}

/// Applies a student's privacy setting for a company viewer.
pub fn mask_for_company(user: User) -> UserView {
    if user.privacy_setting == PrivacySetting::Private {
        return UserView::Stub(UserStub {
            id: user.id,
            role: user.role,
            privacy_setting: user.privacy_setting,
        });
    }

    let privacy = user.privacy_setting;
    let mut public = PublicUser::from(user);
    public.profile.phone = None;
    if privacy == PrivacySetting::Restricted {
        public.email = None;
        public.profile.first_name = None;
        public.profile.last_name = None;
    }
    if let Value::Object(map) = &mut public.intern_profile {
        for field in HIDDEN_INTERN_FIELDS {
            map.remove(*field);
        }
    }
    UserView::Full(public)
}

/// Admins and the user themself see everything; companies see students
/// through [`mask_for_company`]; everything else is refused.
pub fn view_user(viewer: &AuthUser, target: User) -> Result<UserView, AppError> {
    if viewer.is_admin() || viewer.id == target.id {
        return Ok(UserView::Full(target.into()));
    }
    match (viewer.role, target.role) {
        (Role::Company, Role::Student) => Ok(mask_for_company(target)),
        _ => Err(AppError::forbidden()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::extractor::sample_auth;
    use crate::models::user::sample_user;

    fn full(view: UserView) -> PublicUser {
        match view {
            UserView::Full(u) => u,
            UserView::Stub(_) => panic!("expected full view"),
        }
    }

    #[test]
    fn test_admin_and_self_see_everything() {
        let target = sample_user(Role::Student);
        let admin = sample_auth(Role::Admin);
        let u = full(view_user(&admin, target.clone()).unwrap());
        assert_eq!(u.profile.phone.as_deref(), Some("+60 12 345 6789"));
        assert_eq!(u.intern_profile["gpa"], 3.9);

        let mut me = sample_auth(Role::Student);
        me.id = target.id;
        assert!(full(view_user(&me, target).unwrap()).email.is_some());
    }

    #[test]
    fn test_company_sees_full_profile_without_phone_or_grades() {
        let target = sample_user(Role::Student);
        let u = full(view_user(&sample_auth(Role::Company), target).unwrap());
        assert_eq!(u.profile.phone, None);
        assert_eq!(u.profile.first_name.as_deref(), Some("Ada"));
        assert!(u.email.is_some());
        assert!(u.intern_profile.get("gpa").is_none());
        assert!(u.intern_profile.get("resume").is_none());
        assert!(u.intern_profile.get("portfolio").is_none());
        assert_eq!(u.intern_profile["university"], "UM");
    }

    #[test]
    fn test_restricted_hides_contact_and_names() {
        let mut target = sample_user(Role::Student);
        target.privacy_setting = PrivacySetting::Restricted;
        let u = full(mask_for_company(target));
        assert_eq!(u.email, None);
        assert_eq!(u.profile.first_name, None);
        assert_eq!(u.profile.last_name, None);
        assert_eq!(u.profile.city.as_deref(), Some("Kuala Lumpur"));
    }

    #[test]
    fn test_private_is_a_stub() {
        let mut target = sample_user(Role::Student);
        target.privacy_setting = PrivacySetting::Private;
        let id = target.id;
        let json = serde_json::to_value(mask_for_company(target)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "id": id, "role": "student", "privacy_setting": "private" })
        );
    }

    #[test]
    fn test_students_cannot_view_each_other() {
        let target = sample_user(Role::Student);
        assert!(matches!(
            view_user(&sample_auth(Role::Student), target),
            Err(AppError::Forbidden(_))
        ));
    }
}
