use sha2::{Digest, Sha256};

use crate::models::skill::{SkillCategory, SkillRecord};

const MIN_LEVEL: u8 = 40;
const LEVEL_SPREAD: u64 = 51;
const TARGET_STEP: u8 = 20;

const CATEGORY_TABLE: &[(SkillCategory, &[&str])] = &[
    (
        SkillCategory::Programming,
        &[
            "javascript", "typescript", "python", "java", "rust", "golang", "go", "c++", "c#",
            "ruby", "php", "swift", "kotlin", "scala",
        ],
    ),
    (
        SkillCategory::Frontend,
        &[
            "react", "angular", "vue", "svelte", "next.js", "html", "css", "sass", "tailwind",
            "figma", "redux",
        ],
    ),
    (
        SkillCategory::Backend,
        &[
            "node.js", "express", "django", "flask", "fastapi", "spring", "rails", "graphql",
            "rest", "microservices", "kafka", "rabbitmq",
        ],
    ),
    (
        SkillCategory::Database,
        &[
            "sql", "postgresql", "mysql", "mongodb", "redis", "elasticsearch", "sqlite",
            "dynamodb", "cassandra",
        ],
    ),
    (
        SkillCategory::Devops,
        &[
            "docker", "kubernetes", "terraform", "ansible", "jenkins", "aws", "azure", "gcp",
            "linux", "git", "ci/cd",
        ],
    ),
    (
        SkillCategory::Soft,
        &[
            "leadership", "communication", "teamwork", "mentoring", "collaboration",
            "problem solving", "project management", "agile", "scrum",
        ],
    ),
];

/// Builds fresh records for detected skill names. Progress starts at 0; an
/// existing record's progress is spliced back in by the cache merge.
pub fn assess_skills(names: &[String]) -> Vec<SkillRecord> {
    names
        .iter()
        .map(|name| {
            let name = name.trim().to_lowercase();
            let level = initial_level(&name);
            SkillRecord {
                category: categorize(&name),
                level,
                target_level: level.saturating_add(TARGET_STEP).min(100),
                last_practiced: None,
                progress: 0,
                name,
            }
        })
        .collect()
}

/// Stable per-name level in 40–90, seeded from a SHA-256 of the name so the
/// same skill always starts at the same level across runs and processes.
pub fn initial_level(name: &str) -> u8 {
    let digest = Sha256::digest(name.as_bytes());
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest[..8]);
    MIN_LEVEL + (u64::from_be_bytes(seed) % LEVEL_SPREAD) as u8
}

pub fn categorize(name: &str) -> SkillCategory {
    CATEGORY_TABLE
        .iter()
        .find(|(_, members)| members.contains(&name))
        .map(|(category, _)| *category)
        .unwrap_or(SkillCategory::Other)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_levels_are_deterministic_and_in_range() {
        let first = assess_skills(&names(&["rust", "docker", "figma", "negotiation"]));
        let second = assess_skills(&names(&["rust", "docker", "figma", "negotiation"]));
        assert_eq!(first, second);
        for skill in &first {
            assert!((40..=90).contains(&skill.level), "{} = {}", skill.name, skill.level);
            assert_eq!(skill.target_level, (skill.level + 20).min(100));
            assert_eq!(skill.progress, 0);
            assert!(skill.last_practiced.is_none());
        }
    }

    #[test]
    fn test_categories_come_from_tables() {
        let skills =
            assess_skills(&names(&["React", "PostgreSQL", "kubernetes", "mentoring", "cobol"]));
        let categories: Vec<_> = skills.iter().map(|s| s.category).collect();
        assert_eq!(
            categories,
            vec![
                SkillCategory::Frontend,
                SkillCategory::Database,
                SkillCategory::Devops,
                SkillCategory::Soft,
                SkillCategory::Other,
            ]
        );
        assert_eq!(skills[0].name, "react");
    }

    #[test]
    fn test_levels_vary_across_names() {
        let skills = assess_skills(&names(&[
            "rust", "go", "python", "java", "docker", "sql", "react", "aws",
        ]));
        let first = skills[0].level;
        assert!(skills.iter().any(|s| s.level != first));
    }
}
