use crate::domain::UserId;

/// Allow-list check for admin-only commands. An empty list authorizes nobody.
pub fn is_authorized(user_id: Option<UserId>, allowed_users: &[i64]) -> bool {
    let Some(user_id) = user_id else {
        return false;
    };
    if allowed_users.is_empty() {
        return false;
    }
    allowed_users.contains(&user_id.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_listed_users_are_authorized() {
        let admins = [10, 20];
        assert!(is_authorized(Some(UserId(10)), &admins));
        assert!(!is_authorized(Some(UserId(30)), &admins));
        assert!(!is_authorized(None, &admins));
        assert!(!is_authorized(Some(UserId(10)), &[]));
    }
}
