use serde::{Deserialize, Serialize};

/// Text shown for the "all values" selection
pub const ALL_TEXT: &str = "All";
/// Value bound to the "all values" selection
pub const ALL_VALUE: &str = "$__all";

/// A bound value: either a single string or a multi-select list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Single(String),
    Multi(Vec<String>),
}

impl Default for VariableValue {
    fn default() -> Self {
        Self::Multi(Vec::new())
    }
}

impl VariableValue {
    fn contains(&self, needle: &str) -> bool {
        match self {
            Self::Single(value) => value == needle,
            Self::Multi(values) => values.iter().any(|value| value == needle),
        }
    }

    fn to_list(&self) -> Vec<String> {
        match self {
            Self::Single(value) => vec![value.clone()],
            Self::Multi(values) => values.clone(),
        }
    }
}

/// Current selection of a variable
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<VariableValue>,
    #[serde(default)]
    pub value: VariableValue,
}

/// One of the enumerated choices of a variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableOption {
    pub text: String,
    pub value: String,
}

impl VariableOption {
    pub fn new(text: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            value: value.into(),
        }
    }

    fn is_all(&self) -> bool {
        self.text == ALL_TEXT || self.value == ALL_VALUE
    }
}

/// A dashboard template variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateVariable {
    pub name: String,
    #[serde(default)]
    pub current: CurrentSelection,
    #[serde(default)]
    pub options: Vec<VariableOption>,
}

impl TemplateVariable {
    /// Creates a variable bound to a single value
    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current: CurrentSelection {
                text: None,
                value: VariableValue::Single(value.into()),
            },
            options: Vec::new(),
        }
    }

    /// Creates a variable bound to several values
    pub fn multi<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            current: CurrentSelection {
                text: None,
                value: VariableValue::Multi(values.into_iter().map(Into::into).collect()),
            },
            options: Vec::new(),
        }
    }

    /// Creates a variable with the "all values" selection over the given options
    pub fn all(name: impl Into<String>, options: Vec<VariableOption>) -> Self {
        Self {
            name: name.into(),
            current: CurrentSelection {
                text: Some(VariableValue::Single(ALL_TEXT.to_string())),
                value: VariableValue::Single(ALL_VALUE.to_string()),
            },
            options,
        }
    }

    /// Returns true when the "all values" sentinel is selected
    pub fn is_all(&self) -> bool {
        let text_is_all = self
            .current
            .text
            .as_ref()
            .map(|text| text.contains(ALL_TEXT))
            .unwrap_or(false);
        text_is_all || self.current.value.contains(ALL_VALUE)
    }

    /// Effective values to expand over
    pub fn values(&self) -> Vec<String> {
        if self.is_all() {
            return self
                .options
                .iter()
                .filter(|option| !option.is_all())
                .map(|option| option.value.clone())
                .collect();
        }
        self.current.value.to_list()
    }
}

/// Ordered set of the dashboard's template variables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateVariables(Vec<TemplateVariable>);

impl TemplateVariables {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, variable: TemplateVariable) {
        self.0.push(variable);
    }

    pub fn get(&self, name: &str) -> Option<&TemplateVariable> {
        self.0.iter().find(|variable| variable.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TemplateVariable> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<TemplateVariable>> for TemplateVariables {
    fn from(variables: Vec<TemplateVariable>) -> Self {
        Self(variables)
    }
}

impl FromIterator<TemplateVariable> for TemplateVariables {
    fn from_iter<I: IntoIterator<Item = TemplateVariable>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
