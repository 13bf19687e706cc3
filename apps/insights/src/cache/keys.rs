use std::fmt;
use std::time::Duration;

/// Data classes held in the cache. Each has a fixed TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Dashboard,
    Skills,
    Articles,
    Recommendations,
    /// Entity extraction results, keyed by a hash of the input text.
    Ner,
    /// Candidate articles for one skill, shared by every user.
    SkillArticles,
    /// Terminal job payloads, keyed `resume:{user_id}:{job_id}`.
    Resume,
}

/// Namespaces dropped together when a user's analysis changes.
pub const USER_NAMESPACES: [Namespace; 4] = [
    Namespace::Dashboard,
    Namespace::Skills,
    Namespace::Articles,
    Namespace::Recommendations,
];

const HOUR: u64 = 60 * 60;

impl Namespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::Dashboard => "dashboard",
            Namespace::Skills => "skills",
            Namespace::Articles => "articles",
            Namespace::Recommendations => "recommendations",
            Namespace::Ner => "ner",
            Namespace::SkillArticles => "skill-articles",
            Namespace::Resume => "resume",
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(match self {
            Namespace::Dashboard => HOUR,
            Namespace::Skills => 24 * HOUR,
            Namespace::Articles => 6 * HOUR,
            Namespace::Recommendations => 30 * 60,
            Namespace::Ner => 24 * HOUR,
            Namespace::SkillArticles => 6 * HOUR,
            Namespace::Resume => HOUR,
        })
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// `{namespace}:{subject}[:{extra}]`. The subject is a user id for per-user
/// namespaces, a content hash for `Ner` and a skill name for `SkillArticles`.
pub fn cache_key(namespace: Namespace, subject: &str, extra: Option<&str>) -> String {
    match extra {
        Some(extra) => format!("{}:{}:{}", namespace.prefix(), subject, extra),
        None => format!("{}:{}", namespace.prefix(), subject),
    }
}
