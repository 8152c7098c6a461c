use chrono::Duration;

/// What identifies the caller a limit counts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Client IP address.
    Ip,
    /// Authenticated user id, qualified by partition.
    User,
}

/// The request being counted, as seen by the limiter.
#[derive(Debug, Clone, Copy)]
pub struct Caller<'a> {
    pub ip: &'a str,
    /// `"{partition}:{user_id}"` once the password step has passed.
    pub user: Option<&'a str>,
}

impl<'a> Caller<'a> {
    pub fn anonymous(ip: &'a str) -> Self {
        Self { ip, user: None }
    }

    pub fn user(ip: &'a str, user: &'a str) -> Self {
        Self {
            ip,
            user: Some(user),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Limit {
    pub(crate) max_attempts: u32,
    pub(crate) window: Duration,
    pub(crate) key_strategy: KeyStrategy,
}

impl Limit {
    #[must_use]
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            key_strategy: KeyStrategy::Ip,
        }
    }

    #[must_use]
    pub fn per_minute(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::minutes(1))
    }

    #[must_use]
    pub fn by_ip(mut self) -> Self {
        self.key_strategy = KeyStrategy::Ip;
        self
    }

    #[must_use]
    pub fn by_user(mut self) -> Self {
        self.key_strategy = KeyStrategy::User;
        self
    }

    pub fn window_secs(&self) -> u64 {
        u64::try_from(self.window.num_seconds()).unwrap_or(u64::MAX)
    }

    /// The part of `caller` this limit counts against. `None` for a
    /// user-keyed limit on an anonymous caller.
    pub fn identity<'a>(&self, caller: &Caller<'a>) -> Option<&'a str> {
        match self.key_strategy {
            KeyStrategy::Ip => Some(caller.ip),
            KeyStrategy::User => caller.user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_per_minute() {
        let limit = Limit::per_minute(10);
        assert_eq!(limit.max_attempts, 10);
        assert_eq!(limit.window_secs(), 60);
        assert_eq!(limit.key_strategy, KeyStrategy::Ip);
    }

    #[test]
    fn test_identity_follows_strategy() {
        let caller = Caller::user("203.0.113.9", "acme:42");

        assert_eq!(Limit::per_minute(10).by_ip().identity(&caller), Some("203.0.113.9"));
        assert_eq!(Limit::per_minute(10).by_user().identity(&caller), Some("acme:42"));
        assert_eq!(
            Limit::per_minute(10)
                .by_user()
                .identity(&Caller::anonymous("203.0.113.9")),
            None
        );
    }
}
