//! Skill field contracts: which payload key feeds which placeholder.
//!
//! The engine consults a [`SkillRegistry`]; it never owns payload schemas.
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub payload_key: &'static str,
    pub placeholder: &'static str,
    pub required: bool,
    /// Arrays are joined with the skill's list separator.
    pub list: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillSpec {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
    pub list_separator: &'static str,
}

impl SkillSpec {
    pub fn field_for_placeholder(&self, placeholder: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|field| field.placeholder == placeholder)
    }

    /// Render a payload value as replacement text. `None` means absent.
    pub fn render_value(&self, field: &FieldSpec, value: &Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
            Value::Array(items) if field.list => Some(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(self.list_separator),
            ),
            Value::Array(_) | Value::Object(_) => Some(value.to_string()),
        }
    }
}

pub trait SkillRegistry {
    fn lookup(&self, skill_id: &str) -> Option<&SkillSpec>;

    /// Supported skill ids in stable order.
    fn skill_ids(&self) -> Vec<&'static str>;
}

const fn field(
    payload_key: &'static str,
    placeholder: &'static str,
    required: bool,
) -> FieldSpec {
    FieldSpec {
        payload_key,
        placeholder,
        required,
        list: false,
    }
}

const fn list_field(payload_key: &'static str, placeholder: &'static str) -> FieldSpec {
    FieldSpec {
        payload_key,
        placeholder,
        required: false,
        list: true,
    }
}

const MEETING_NOTICE: SkillSpec = SkillSpec {
    name: "meeting_notice",
    fields: &[
        field("meeting_title", "MEETING_TITLE", true),
        field("meeting_date", "MEETING_DATE", true),
        field("meeting_time", "MEETING_TIME", true),
        field("meeting_location", "MEETING_LOCATION", true),
        field("organizer", "ORGANIZER", true),
        list_field("attendees", "ATTENDEES"),
    ],
    list_separator: ", ",
};

const TRAINING_NOTICE: SkillSpec = SkillSpec {
    name: "training_notice",
    fields: &[
        field("training_title", "TRAINING_TITLE", true),
        field("training_date", "TRAINING_DATE", true),
        field("training_time", "TRAINING_TIME", true),
        field("training_location", "TRAINING_LOCATION", true),
        field("trainer", "TRAINER", true),
        field("organizer", "ORGANIZER", false),
        list_field("attendees", "ATTENDEES"),
    ],
    list_separator: ", ",
};

const INSPECTION_RECORD: SkillSpec = SkillSpec {
    name: "inspection_record",
    fields: &[
        field("inspection_subject", "INSPECTION_SUBJECT", true),
        field("inspection_date", "INSPECTION_DATE", true),
        field("inspector", "INSPECTOR", true),
        field("department", "DEPARTMENT", false),
        field("issue_summary", "ISSUE_SUMMARY", true),
        field("action_required", "ACTION_REQUIRED", false),
        field("deadline", "DEADLINE", false),
    ],
    list_separator: ", ",
};

static BUILTIN_SKILLS: &[SkillSpec] = &[INSPECTION_RECORD, MEETING_NOTICE, TRAINING_NOTICE];

/// The skills shipped with the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSkills;

impl SkillRegistry for BuiltinSkills {
    fn lookup(&self, skill_id: &str) -> Option<&SkillSpec> {
        BUILTIN_SKILLS.iter().find(|skill| skill.name == skill_id)
    }

    fn skill_ids(&self) -> Vec<&'static str> {
        BUILTIN_SKILLS.iter().map(|skill| skill.name).collect()
    }
}
