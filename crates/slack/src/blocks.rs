use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    #[serde(rename = "mrkdwn")]
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

/// Buttons without an `action_id` get one assigned by Slack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(label: impl Into<String>) -> Self {
        Self { action_id: None, text: TextObject::plain(label), style: None, value: None }
    }

    pub fn action_id(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub text: TextObject,
    pub value: String,
}

impl SelectOption {
    /// Option whose label and value are the same string.
    pub fn labelled(label: impl Into<String>) -> Self {
        let label = label.into();
        Self { text: TextObject::plain(label.clone()), value: label }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectElement {
    pub action_id: String,
    pub placeholder: TextObject,
    pub options: Vec<SelectOption>,
}

impl SelectElement {
    /// Slack rejects static selects with more than 100 options.
    pub const MAX_OPTIONS: usize = 99;

    pub fn new(action_id: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            placeholder: TextObject::plain(placeholder),
            options: Vec::new(),
        }
    }

    pub fn options<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options =
            labels.into_iter().take(Self::MAX_OPTIONS).map(SelectOption::labelled).collect();
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionElement {
    Button(ButtonElement),
    StaticSelect(SelectElement),
}

impl ActionElement {
    pub fn action_id(&self) -> Option<&str> {
        match self {
            Self::Button(button) => button.action_id.as_deref(),
            Self::StaticSelect(select) => Some(&select.action_id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<ActionElement>,
    },
    Actions {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        elements: Vec<ActionElement>,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    /// Appends `other`'s blocks; the first non-empty fallback text wins.
    pub fn then(mut self, other: MessageTemplate) -> Self {
        if self.fallback_text.is_empty() {
            self.fallback_text = other.fallback_text;
        }
        self.blocks.extend(other.blocks);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Every text object in block order, handy for logging and assertions.
    pub fn texts(&self) -> Vec<&str> {
        let mut texts = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Section { text, .. } => texts.push(text.text()),
                Block::Actions { elements, .. } => {
                    for element in elements {
                        if let ActionElement::Button(button) = element {
                            texts.push(button.text.text());
                        }
                    }
                }
            }
        }
        texts
    }

    pub fn blocks_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&self.blocks)
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(self, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        self.push_section(None, build)
    }

    pub fn section_with_id<F>(self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        self.push_section(Some(block_id.into()), build)
    }

    fn push_section<F>(mut self, block_id: Option<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        let (text, accessory) = builder.build();
        self.blocks.push(Block::Section { block_id, text, accessory });
        self
    }

    pub fn actions<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: None, elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
    accessory: Option<ActionElement>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    pub fn accessory(&mut self, element: ActionElement) -> &mut Self {
        self.accessory = Some(element);
        self
    }

    fn build(self) -> (TextObject, Option<ActionElement>) {
        (self.text.unwrap_or_else(|| TextObject::plain("")), self.accessory)
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ActionElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(ActionElement::Button(button));
        self
    }

    pub fn select(&mut self, select: SelectElement) -> &mut Self {
        self.elements.push(ActionElement::StaticSelect(select));
        self
    }

    fn build(self) -> Vec<ActionElement> {
        self.elements
    }
}

/// Single markdown section, the building block of nearly every reply.
pub fn text_message(text: impl Into<String>) -> MessageTemplate {
    let text = text.into();
    MessageBuilder::new(text.clone())
        .section(|section| {
            section.mrkdwn(text);
        })
        .build()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        text_message, ActionElement, Block, ButtonElement, MessageBuilder, SelectElement,
        TextObject,
    };

    #[test]
    fn section_without_block_id_omits_the_field() {
        let message = text_message("hi there");
        let value = message.blocks_json().expect("serialize");
        assert_eq!(
            value,
            json!([{ "type": "section", "text": { "type": "mrkdwn", "text": "hi there" } }])
        );
    }

    #[test]
    fn select_and_button_serialize_with_slack_type_tags() {
        let message = MessageBuilder::new("pick")
            .section_with_id("skillgroup-0", |section| {
                section.plain("Pick one").accessory(ActionElement::Button(
                    ButtonElement::new("Back").action_id("skills-goback").value("back"),
                ));
            })
            .actions(|actions| {
                actions.select(SelectElement::new("skills", "Select a skill").options(["Go"]));
            })
            .build();

        let value = message.blocks_json().expect("serialize");
        assert_eq!(value[0]["block_id"], "skillgroup-0");
        assert_eq!(value[0]["text"]["type"], "plain_text");
        assert_eq!(value[0]["accessory"]["type"], "button");
        assert_eq!(value[0]["accessory"]["action_id"], "skills-goback");
        assert_eq!(value[1]["elements"][0]["type"], "static_select");
        assert_eq!(value[1]["elements"][0]["options"][0], json!({
            "text": { "type": "plain_text", "text": "Go" },
            "value": "Go"
        }));
    }

    #[test]
    fn select_caps_option_count() {
        let select = SelectElement::new("skills", "Select a skill")
            .options((0..150).map(|index| format!("skill-{index}")));
        assert_eq!(select.options.len(), SelectElement::MAX_OPTIONS);
    }

    #[test]
    fn then_concatenates_blocks_and_keeps_first_fallback() {
        let message = text_message("first").then(text_message("second"));
        assert_eq!(message.fallback_text, "first");
        assert_eq!(message.texts(), vec!["first", "second"]);
        assert!(matches!(
            &message.blocks[1],
            Block::Section { text: TextObject::Mrkdwn { text }, .. } if text == "second"
        ));
    }

    #[test]
    fn buttons_without_action_id_leave_it_to_slack() {
        let button = ButtonElement::new("Yes").value("yes");
        let value = serde_json::to_value(ActionElement::Button(button)).expect("serialize");
        assert!(value.get("action_id").is_none());
        assert_eq!(value["value"], "yes");
    }
}
