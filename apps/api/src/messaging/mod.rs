pub mod handlers;

use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::enums::Role;
use crate::models::messaging::ThreadRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    Student,
    Company,
}

/// Which side of `thread` the caller is on, if any. `own_company` is the
/// company the caller owns, when they are a company user.
pub fn participant_of(
    thread: &ThreadRow,
    user: &AuthUser,
    own_company: Option<Uuid>,
) -> Option<Participant> {
    match user.role {
        Role::Student if thread.user_id == user.id => Some(Participant::Student),
        Role::Company if own_company == Some(thread.company_id) => Some(Participant::Company),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::extractor::sample_auth;
    use chrono::Utc;

    fn thread(user_id: Uuid, company_id: Uuid) -> ThreadRow {
        ThreadRow {
            id: Uuid::new_v4(),
            company_id,
            user_id,
            last_message_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_participants() {
        let student = sample_auth(Role::Student);
        let owner = sample_auth(Role::Company);
        let company_id = Uuid::new_v4();
        let t = thread(student.id, company_id);

        assert_eq!(participant_of(&t, &student, None), Some(Participant::Student));
        assert_eq!(participant_of(&t, &owner, Some(company_id)), Some(Participant::Company));
        assert_eq!(participant_of(&t, &owner, Some(Uuid::new_v4())), None);
        assert_eq!(participant_of(&t, &owner, None), None);
    }

    #[test]
    fn test_other_users_are_not_participants() {
        let company_id = Uuid::new_v4();
        let t = thread(Uuid::new_v4(), company_id);
        assert_eq!(participant_of(&t, &sample_auth(Role::Student), None), None);
        assert_eq!(participant_of(&t, &sample_auth(Role::Admin), Some(company_id)), None);
    }
}
