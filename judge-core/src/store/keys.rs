use crate::session::SessionId;

/// Logical key layout shared by every store backend.
///
/// `status:<id>`, `result:<id>` and the `latest_session_id` singleton,
/// optionally behind a namespace prefix so several deployments can share one
/// Redis database.
#[derive(Debug, Clone, Default)]
pub struct StoreKeys {
    namespace: String,
}

impl StoreKeys {
    pub fn new(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let namespace = match namespace.trim_end_matches(':') {
            "" => String::new(),
            trimmed => format!("{trimmed}:"),
        };
        Self { namespace }
    }

    pub fn status(&self, session_id: &SessionId) -> String {
        format!("{}status:{}", self.namespace, session_id)
    }

    pub fn result(&self, session_id: &SessionId) -> String {
        format!("{}result:{}", self.namespace, session_id)
    }

    pub fn latest_session(&self) -> String {
        format!("{}latest_session_id", self.namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_without_namespace() {
        let keys = StoreKeys::default();
        let id = SessionId::parse("s1").unwrap();
        assert_eq!(keys.status(&id), "status:s1");
        assert_eq!(keys.result(&id), "result:s1");
        assert_eq!(keys.latest_session(), "latest_session_id");
    }

    #[test]
    fn namespace_is_normalized() {
        let id = SessionId::parse("s1").unwrap();
        assert_eq!(StoreKeys::new("judge").status(&id), "judge:status:s1");
        assert_eq!(StoreKeys::new("judge:").status(&id), "judge:status:s1");
        assert_eq!(StoreKeys::new(":").latest_session(), "latest_session_id");
    }
}
