pub const DEFAULT_POLICY_YAML: &str = include_str!("../templates/default_policy.yaml");
