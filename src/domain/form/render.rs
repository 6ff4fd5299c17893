//! Form rendering
//!
//! [`FormRenderer::render`] turns the field model plus current control values
//! into a [`FormView`]: a tree of controls addressed by concrete paths. Array
//! items are instantiated from the item template with a fresh index per item;
//! unions show a branch selector and only the active branch.

use serde::Serialize;

use super::field::{FieldDescriptor, FieldKind, FieldModel, SelectOption, ValidationRules};
use super::path::FieldPath;
use super::state::FormState;
use crate::domain::text::html_escape;

/// HTML input type chosen from a text field's `format`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputType {
    Text,
    Number,
    Email,
    Url,
    Date,
    DatetimeLocal,
    Time,
    Textarea,
}

impl InputType {
    pub fn for_format(format: Option<&str>) -> Self {
        match format {
            Some("email") => InputType::Email,
            Some("uri") | Some("url") => InputType::Url,
            Some("date") => InputType::Date,
            Some("date-time") => InputType::DatetimeLocal,
            Some("time") => InputType::Time,
            Some("textarea") | Some("markdown") => InputType::Textarea,
            _ => InputType::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Number => "number",
            InputType::Email => "email",
            InputType::Url => "url",
            InputType::Date => "date",
            InputType::DatetimeLocal => "datetime-local",
            InputType::Time => "time",
            InputType::Textarea => "textarea",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum Widget {
    Input {
        input_type: InputType,
        value: String,
    },
    Select {
        options: Vec<SelectOption>,
        value: String,
    },
    /// Unset / true / false
    Boolean { value: Option<bool> },
    /// Structured value edited as JSON text
    Json { value: String },
    Group,
    Repeat {
        count: usize,
        can_add: bool,
        can_remove: bool,
    },
    Union { options: Vec<String>, selected: usize },
}

/// One rendered control; containers carry their children
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ControlView {
    pub address: FieldPath,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    #[serde(flatten)]
    pub widget: Widget,
    #[serde(skip_serializing_if = "is_default_rules")]
    pub rules: ValidationRules,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ControlView>,
}

fn is_default_rules(rules: &ValidationRules) -> bool {
    *rules == ValidationRules::default()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FormView {
    pub title: String,
    pub controls: Vec<ControlView>,
}

pub struct FormRenderer;

impl FormRenderer {
    pub fn render(model: &FieldModel, state: &FormState) -> FormView {
        let controls = model
            .root
            .children
            .iter()
            .map(|child| render_field(child, FieldPath::root().child(&child.name), state))
            .collect();
        FormView {
            title: model.root.label.clone(),
            controls,
        }
    }
}

/// Items to show for an array field
pub fn item_count(field: &FieldDescriptor, address: &FieldPath, state: &FormState) -> usize {
    let min = field.rules.min_items.unwrap_or(0) as usize;
    let max = field.rules.max_items.map(|m| m as usize);
    let count = match state.item_counts.get(address) {
        Some(explicit) => (*explicit).max(min),
        None => {
            let derived = state.item_count(address).unwrap_or(0).max(min);
            if derived == 0 {
                1
            } else {
                derived
            }
        }
    };
    max.map_or(count, |max| count.min(max))
}

fn render_field(field: &FieldDescriptor, address: FieldPath, state: &FormState) -> ControlView {
    let value = state.get(&address).unwrap_or_default().to_string();
    let mut children = Vec::new();

    let widget = match field.kind {
        FieldKind::Text => Widget::Input {
            input_type: InputType::for_format(field.rules.format.as_deref()),
            value,
        },
        FieldKind::Number => Widget::Input {
            input_type: InputType::Number,
            value,
        },
        FieldKind::Boolean => Widget::Boolean {
            value: match value.as_str() {
                "true" | "on" => Some(true),
                "false" | "off" => Some(false),
                _ => None,
            },
        },
        FieldKind::Select => Widget::Select {
            options: field.options.clone(),
            value,
        },
        FieldKind::Raw => Widget::Json { value },
        FieldKind::Object => {
            children = field
                .children
                .iter()
                .map(|c| render_field(c, address.child(&c.name), state))
                .collect();
            Widget::Group
        }
        FieldKind::Array => {
            let count = item_count(field, &address, state);
            if let Some(template) = field.item() {
                children = (0..count)
                    .map(|i| render_field(template, address.index(i), state))
                    .collect();
            }
            let min = field.rules.min_items.unwrap_or(0) as usize;
            Widget::Repeat {
                count,
                can_add: field.rules.max_items.map_or(true, |max| count < max as usize),
                can_remove: count > min,
            }
        }
        FieldKind::Union => {
            let selected = state
                .selected_branch(&address)
                .min(field.children.len().saturating_sub(1));
            if let Some(branch) = field.branch(selected) {
                children.push(render_field(branch, address.branch(selected), state));
            }
            Widget::Union {
                options: field.children.iter().map(|c| c.label.clone()).collect(),
                selected,
            }
        }
    };

    ControlView {
        address,
        label: field.label.clone(),
        description: field.description.clone(),
        required: field.required,
        widget,
        rules: field.rules.clone(),
        children,
    }
}

// ============================================================================
// HTML
// ============================================================================

impl FormView {
    /// Escaped form markup whose `name` attributes are the control addresses
    pub fn to_html(&self) -> String {
        let mut html = String::from("<form class=\"schema-form\" method=\"post\">");
        html.push_str(&format!("<h2>{}</h2>", html_escape(&self.title)));
        for control in &self.controls {
            control.write_html(&mut html);
        }
        html.push_str("<button type=\"submit\">Submit</button></form>");
        html
    }
}

impl ControlView {
    fn write_html(&self, html: &mut String) {
        let name = html_escape(&self.address.to_string());
        let label = html_escape(&self.label);
        let required_mark = if self.required { " <span class=\"required\">*</span>" } else { "" };

        match &self.widget {
            Widget::Group => {
                html.push_str(&format!("<fieldset data-path=\"{}\"><legend>{}{}</legend>", name, label, required_mark));
                self.write_description(html);
                for child in &self.children {
                    child.write_html(html);
                }
                html.push_str("</fieldset>");
            }
            Widget::Repeat { count, can_add, can_remove } => {
                html.push_str(&format!(
                    "<fieldset class=\"repeat\" data-path=\"{}\" data-count=\"{}\"><legend>{}{}</legend>",
                    name, count, label, required_mark
                ));
                self.write_description(html);
                for (i, item) in self.children.iter().enumerate() {
                    html.push_str(&format!("<div class=\"repeat-item\" data-index=\"{}\">", i));
                    item.write_html(html);
                    if *can_remove {
                        html.push_str(&format!(
                            "<button type=\"button\" data-action=\"remove\" data-path=\"{}\" data-index=\"{}\">Remove</button>",
                            name, i
                        ));
                    }
                    html.push_str("</div>");
                }
                if *can_add {
                    html.push_str(&format!(
                        "<button type=\"button\" data-action=\"add\" data-path=\"{}\">Add</button>",
                        name
                    ));
                }
                html.push_str("</fieldset>");
            }
            Widget::Union { options, selected } => {
                html.push_str(&format!("<div class=\"union\" data-path=\"{}\">", name));
                html.push_str(&format!("<label for=\"{0}\">{1}{2}</label><select id=\"{0}\" name=\"{0}\" data-role=\"branch\">", name, label, required_mark));
                for (i, option) in options.iter().enumerate() {
                    let sel = if i == *selected { " selected" } else { "" };
                    html.push_str(&format!("<option value=\"{}\"{}>{}</option>", i, sel, html_escape(option)));
                }
                html.push_str("</select>");
                self.write_description(html);
                for child in &self.children {
                    child.write_html(html);
                }
                html.push_str("</div>");
            }
            Widget::Input { input_type, value } => {
                html.push_str(&format!("<div class=\"field\"><label for=\"{0}\">{1}{2}</label>", name, label, required_mark));
                if *input_type == InputType::Textarea {
                    html.push_str(&format!(
                        "<textarea id=\"{0}\" name=\"{0}\"{1}>{2}</textarea>",
                        name,
                        self.constraint_attrs(),
                        html_escape(value)
                    ));
                } else {
                    html.push_str(&format!(
                        "<input type=\"{}\" id=\"{1}\" name=\"{1}\" value=\"{2}\"{3}>",
                        input_type.as_str(),
                        name,
                        html_escape(value),
                        self.constraint_attrs()
                    ));
                }
                self.write_description(html);
                html.push_str("</div>");
            }
            Widget::Select { options, value } => {
                html.push_str(&format!("<div class=\"field\"><label for=\"{0}\">{1}{2}</label>", name, label, required_mark));
                html.push_str(&format!("<select id=\"{0}\" name=\"{0}\"{1}>", name, self.constraint_attrs()));
                html.push_str("<option value=\"\"></option>");
                for option in options {
                    let sel = if option.label == *value { " selected" } else { "" };
                    let text = html_escape(&option.label);
                    html.push_str(&format!("<option value=\"{0}\"{1}>{0}</option>", text, sel));
                }
                html.push_str("</select>");
                self.write_description(html);
                html.push_str("</div>");
            }
            Widget::Boolean { value } => {
                html.push_str(&format!("<div class=\"field\"><label for=\"{0}\">{1}{2}</label>", name, label, required_mark));
                html.push_str(&format!("<select id=\"{0}\" name=\"{0}\"{1}>", name, self.constraint_attrs()));
                for (option, state) in [("", None), ("true", Some(true)), ("false", Some(false))] {
                    let sel = if *value == state { " selected" } else { "" };
                    html.push_str(&format!("<option value=\"{0}\"{1}>{0}</option>", option, sel));
                }
                html.push_str("</select>");
                self.write_description(html);
                html.push_str("</div>");
            }
            Widget::Json { value } => {
                html.push_str(&format!("<div class=\"field\"><label for=\"{0}\">{1}{2}</label>", name, label, required_mark));
                html.push_str(&format!(
                    "<textarea class=\"json\" id=\"{0}\" name=\"{0}\"{1}>{2}</textarea>",
                    name,
                    self.constraint_attrs(),
                    html_escape(value)
                ));
                self.write_description(html);
                html.push_str("</div>");
            }
        }
    }

    fn write_description(&self, html: &mut String) {
        if let Some(desc) = &self.description {
            html.push_str(&format!("<p class=\"help\">{}</p>", html_escape(desc)));
        }
    }

    fn constraint_attrs(&self) -> String {
        let mut attrs = String::new();
        if self.required {
            attrs.push_str(" required");
        }
        let rules = &self.rules;
        if let Some(min) = rules.minimum {
            attrs.push_str(&format!(" min=\"{}\"", min));
        }
        if let Some(max) = rules.maximum {
            attrs.push_str(&format!(" max=\"{}\"", max));
        }
        if matches!(self.widget, Widget::Input { input_type: InputType::Number, .. }) {
            attrs.push_str(if rules.integer { " step=\"1\"" } else { " step=\"any\"" });
        }
        if let Some(min) = rules.min_length {
            attrs.push_str(&format!(" minlength=\"{}\"", min));
        }
        if let Some(max) = rules.max_length {
            attrs.push_str(&format!(" maxlength=\"{}\"", max));
        }
        if let Some(pattern) = &rules.pattern {
            attrs.push_str(&format!(" pattern=\"{}\"", html_escape(pattern)));
        }
        attrs
    }
}
