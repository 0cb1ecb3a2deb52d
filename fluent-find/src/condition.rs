//! Attribute predicates used to select elements.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::errors::AutomationError;

/// The kind of control an element represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlType {
    AppBar,
    Button,
    Calendar,
    CheckBox,
    ComboBox,
    Custom,
    DataGrid,
    DataItem,
    Document,
    Edit,
    Group,
    Header,
    HeaderItem,
    Hyperlink,
    Image,
    List,
    ListItem,
    Menu,
    MenuBar,
    MenuItem,
    Pane,
    ProgressBar,
    RadioButton,
    ScrollBar,
    SemanticZoom,
    Separator,
    Slider,
    Spinner,
    SplitButton,
    StatusBar,
    Tab,
    TabItem,
    Table,
    Text,
    Thumb,
    TitleBar,
    ToolBar,
    ToolTip,
    Tree,
    TreeItem,
    Window,
    Unknown,
}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Element attributes a condition can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyId {
    Name,
    ClassName,
    HelpText,
    AutomationId,
    ControlType,
    FrameworkId,
    ProcessId,
    LocalizedControlType,
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyValue {
    String(String),
    ControlType(ControlType),
    Int(i64),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) => write!(f, "'{s}'"),
            PropertyValue::ControlType(ct) => write!(f, "{ct}"),
            PropertyValue::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<ControlType> for PropertyValue {
    fn from(value: ControlType) -> Self {
        PropertyValue::ControlType(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyCondition {
    pub property: PropertyId,
    pub value: PropertyValue,
}

impl fmt::Display for PropertyCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} == {}", self.property, self.value)
    }
}

/// A predicate over an element's attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    True,
    False,
    Property(PropertyCondition),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn property(property: PropertyId, value: impl Into<PropertyValue>) -> Self {
        Condition::Property(PropertyCondition {
            property,
            value: value.into(),
        })
    }

    /// Both conditions must hold. Nested `And`s are flattened.
    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::And(mut all) => {
                all.push(other);
                Condition::And(all)
            }
            first => Condition::And(vec![first, other]),
        }
    }

    /// Either condition must hold. Nested `Or`s are flattened.
    pub fn or(self, other: Condition) -> Self {
        match self {
            Condition::Or(mut any) => {
                any.push(other);
                Condition::Or(any)
            }
            first => Condition::Or(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        match self {
            Condition::Not(inner) => *inner,
            other => Condition::Not(Box::new(other)),
        }
    }

    /// Evaluates the condition against `element`'s current attributes.
    pub fn matches<E: Element>(&self, element: &E) -> Result<bool, AutomationError> {
        match self {
            Condition::True => Ok(true),
            Condition::False => Ok(false),
            Condition::Property(pc) => Ok(element.property(pc.property)?.as_ref() == Some(&pc.value)),
            Condition::And(all) => {
                for c in all {
                    if !c.matches(element)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Or(any) => {
                for c in any {
                    if c.matches(element)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::Not(inner) => Ok(!inner.matches(element)?),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, parts: &[Condition], op: &str) -> fmt::Result {
            write!(f, "(")?;
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    write!(f, " {op} ")?;
                }
                write!(f, "{part}")?;
            }
            write!(f, ")")
        }

        match self {
            Condition::True => write!(f, "True"),
            Condition::False => write!(f, "False"),
            Condition::Property(pc) => write!(f, "{pc}"),
            Condition::And(all) => join(f, all, "AND"),
            Condition::Or(any) => join(f, any, "OR"),
            Condition::Not(inner) => write!(f, "NOT {inner}"),
        }
    }
}

/// Creates conditions keyed by attribute kind.
///
/// Providers hand one out through [`Element::condition_factory`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ConditionFactory;

impl ConditionFactory {
    pub fn by_name(&self, value: impl Into<String>) -> Condition {
        Condition::property(PropertyId::Name, PropertyValue::String(value.into()))
    }

    pub fn by_class_name(&self, value: impl Into<String>) -> Condition {
        Condition::property(PropertyId::ClassName, PropertyValue::String(value.into()))
    }

    pub fn by_help_text(&self, value: impl Into<String>) -> Condition {
        Condition::property(PropertyId::HelpText, PropertyValue::String(value.into()))
    }

    pub fn by_automation_id(&self, value: impl Into<String>) -> Condition {
        Condition::property(PropertyId::AutomationId, PropertyValue::String(value.into()))
    }

    /// Text of a control is exposed through its name.
    pub fn by_text(&self, value: impl Into<String>) -> Condition {
        self.by_name(value)
    }

    pub fn by_control_type(&self, value: ControlType) -> Condition {
        Condition::property(PropertyId::ControlType, value)
    }

    pub fn by_framework_id(&self, value: impl Into<String>) -> Condition {
        Condition::property(PropertyId::FrameworkId, PropertyValue::String(value.into()))
    }

    pub fn by_process_id(&self, value: u32) -> Condition {
        Condition::property(PropertyId::ProcessId, PropertyValue::Int(i64::from(value)))
    }

    pub fn by_localized_control_type(&self, value: impl Into<String>) -> Condition {
        Condition::property(PropertyId::LocalizedControlType, PropertyValue::String(value.into()))
    }
}
