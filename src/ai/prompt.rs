// Prompt template for lyric generation
//
// The fixed blocks are written in Japanese because the prompt is tuned for
// that wording. User fields are appended as one labeled line each, in the
// order of `FieldName::INPUT_FIELDS`, followed by the free-text notes.

use serde::{Deserialize, Serialize};

use super::completion::{Message, Role};
use crate::error::{Error, Result};

pub const INSTRUCTION: &str = "#命令文

あなたは様々なジャンルの歌詞を手掛けている有名な作詞家です。

以下の#条件に従って歌詞を作成してください。
";

pub const CONDITIONS: &str = "#条件

・出力は下記に示す#出力 の通りに生成する。

・歌詞は下記に示す#入力 の通りに生成する。
";

pub const OUTPUT_FORMAT: &str = "#出力
【タイトル】

【歌詞】

━━━１番━━━
[Intro] (イントロ)
[Verse] (Ａメロ)
[Bridge] (Ｂメロ)
[Chorus] (サビ)
━━━２番━━━
[Verse] (Ａメロ)
[Bridge] (Ｂメロ)
[Chorus] (サビ)
━━━３番━━━
[Bridge] (Ｃメロ) または [Solo] (ソロ)
[Chorus] (サビ)
[Outro] (アウトロ)
";

pub const INPUT_HEADER: &str = "#入力";

/// One named input of the form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldName {
    Genre,
    Target,
    Mood,
    LyricsContent,
    Keywords,
    Language,
    FreeText,
}

impl FieldName {
    /// Labeled fields, in prompt order. Free text is appended unlabeled.
    pub const INPUT_FIELDS: [FieldName; 6] = [
        FieldName::Genre,
        FieldName::Target,
        FieldName::Mood,
        FieldName::LyricsContent,
        FieldName::Keywords,
        FieldName::Language,
    ];

    /// Every field in prompt order; free text comes last
    pub const ALL: [FieldName; 7] = [
        FieldName::Genre,
        FieldName::Target,
        FieldName::Mood,
        FieldName::LyricsContent,
        FieldName::Keywords,
        FieldName::Language,
        FieldName::FreeText,
    ];

    /// Name used by the browser form and the JSON API
    pub fn wire_name(self) -> &'static str {
        match self {
            FieldName::Genre => "genre",
            FieldName::Target => "target",
            FieldName::Mood => "mood",
            FieldName::LyricsContent => "lyricsContent",
            FieldName::Keywords => "keywords",
            FieldName::Language => "language",
            FieldName::FreeText => "freeText",
        }
    }

    /// Label used on the prompt line for this field. Free text has none.
    pub fn prompt_label(self) -> Option<&'static str> {
        match self {
            FieldName::Genre => Some("ジャンル"),
            FieldName::Target => Some("ターゲット層"),
            FieldName::Mood => Some("曲及び歌詞の雰囲気"),
            FieldName::LyricsContent => Some("歌詞の内容"),
            FieldName::Keywords => Some("歌詞に含めて欲しい単語"),
            FieldName::Language => Some("言語"),
            FieldName::FreeText => None,
        }
    }

    /// Label shown above the input on the page
    pub fn form_label(self) -> &'static str {
        match self {
            FieldName::Genre => "ジャンル",
            FieldName::Target => "ターゲット層",
            FieldName::Mood => "曲の雰囲気",
            FieldName::LyricsContent => "歌詞の内容",
            FieldName::Keywords => "含めて欲しい単語",
            FieldName::Language => "言語",
            FieldName::FreeText => "必要なら追加情報を入力してください",
        }
    }

    pub fn from_wire_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.wire_name() == name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }
}

/// Current values of every form input. Empty string means "not filled in".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormFields {
    pub genre: String,
    pub target: String,
    pub mood: String,
    pub lyrics_content: String,
    pub keywords: String,
    pub language: String,
    pub free_text: String,
}

impl Default for FormFields {
    fn default() -> Self {
        FormFields {
            genre: "ワークアウト、EDM、BGM".to_string(),
            target: "全年代".to_string(),
            mood: "激しめ、ノリが良い".to_string(),
            lyrics_content: "筋トレが捗るような曲調".to_string(),
            keywords: String::new(),
            language: "英語".to_string(),
            free_text: String::new(),
        }
    }
}

impl FormFields {
    /// All fields empty
    pub fn blank() -> Self {
        FormFields {
            genre: String::new(),
            target: String::new(),
            mood: String::new(),
            lyrics_content: String::new(),
            keywords: String::new(),
            language: String::new(),
            free_text: String::new(),
        }
    }

    pub fn get(&self, field: FieldName) -> &str {
        match field {
            FieldName::Genre => &self.genre,
            FieldName::Target => &self.target,
            FieldName::Mood => &self.mood,
            FieldName::LyricsContent => &self.lyrics_content,
            FieldName::Keywords => &self.keywords,
            FieldName::Language => &self.language,
            FieldName::FreeText => &self.free_text,
        }
    }

    pub fn set(&mut self, field: FieldName, value: impl Into<String>) {
        let slot = match field {
            FieldName::Genre => &mut self.genre,
            FieldName::Target => &mut self.target,
            FieldName::Mood => &mut self.mood,
            FieldName::LyricsContent => &mut self.lyrics_content,
            FieldName::Keywords => &mut self.keywords,
            FieldName::Language => &mut self.language,
            FieldName::FreeText => &mut self.free_text,
        };
        *slot = value.into();
    }
}

/// Build the full prompt text from a snapshot of the form.
pub fn assemble_prompt(fields: &FormFields) -> String {
    let mut prompt = String::new();
    for block in [INSTRUCTION, CONDITIONS, OUTPUT_FORMAT] {
        prompt.push_str(block);
        prompt.push('\n');
    }
    prompt.push_str(INPUT_HEADER);
    prompt.push('\n');
    for field in FieldName::ALL {
        match field.prompt_label() {
            Some(label) => prompt.push_str(&format!("・{}：{}\n", label, fields.get(field))),
            None => prompt.push_str(fields.get(field)),
        }
    }
    prompt
}

/// Wrap the assembled prompt as the single user message of a request.
pub fn build_messages(fields: &FormFields) -> Vec<Message> {
    vec![Message {
        role: Role::User,
        content: assemble_prompt(fields),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rock_fields() -> FormFields {
        FormFields {
            genre: "Rock".to_string(),
            target: "Teens".to_string(),
            mood: "Upbeat".to_string(),
            lyrics_content: "Friendship".to_string(),
            keywords: "sun".to_string(),
            language: "English".to_string(),
            free_text: String::new(),
        }
    }

    #[test]
    fn test_field_lines_in_order() {
        let prompt = assemble_prompt(&rock_fields());
        let expected = [
            "・ジャンル：Rock",
            "・ターゲット層：Teens",
            "・曲及び歌詞の雰囲気：Upbeat",
            "・歌詞の内容：Friendship",
            "・歌詞に含めて欲しい単語：sun",
            "・言語：English",
        ];

        let mut last = 0;
        for line in expected {
            let pos = prompt.find(line).unwrap_or_else(|| panic!("missing line {line}"));
            assert!(pos >= last, "{line} is out of order");
            last = pos;
        }
    }

    #[test]
    fn test_blocks_precede_input() {
        let prompt = assemble_prompt(&rock_fields());
        let instruction = prompt.find("#命令文").unwrap();
        let conditions = prompt.find("#条件\n").unwrap();
        let output = prompt.find("#出力\n").unwrap();
        let input = prompt.find("#入力\n").unwrap();
        assert!(instruction < conditions && conditions < output && output < input);
        assert!(prompt.starts_with(INSTRUCTION));
    }

    #[test]
    fn test_empty_fields_serialized_as_empty() {
        let prompt = assemble_prompt(&FormFields::blank());
        assert!(prompt.contains("・ジャンル：\n"));
        assert!(prompt.contains("・言語：\n"));
        assert!(prompt.ends_with("・言語：\n"));
    }

    #[test]
    fn test_free_text_appended_last() {
        let mut fields = rock_fields();
        fields.free_text = "サビは英語で".to_string();
        let prompt = assemble_prompt(&fields);
        assert!(prompt.ends_with("・言語：English\nサビは英語で"));
    }

    #[test]
    fn test_every_value_present() {
        let mut fields = FormFields::default();
        fields.keywords = "筋肉".to_string();
        fields.free_text = "テンポ速め".to_string();
        let prompt = assemble_prompt(&fields);
        for field in FieldName::ALL {
            assert!(prompt.contains(fields.get(field)), "{:?} missing", field);
        }
    }

    #[test]
    fn test_build_messages_single_user_message() {
        let messages = build_messages(&rock_fields());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert!(messages[0].content.contains("・ジャンル：Rock"));
    }

    #[test]
    fn test_only_free_text_is_unlabeled() {
        for field in FieldName::INPUT_FIELDS {
            assert!(field.prompt_label().is_some());
        }
        assert_eq!(FieldName::FreeText.prompt_label(), None);
        assert_eq!(FieldName::ALL.last(), Some(&FieldName::FreeText));
    }

    #[test]
    fn test_wire_names_round_trip() {
        for field in FieldName::ALL {
            assert_eq!(FieldName::from_wire_name(field.wire_name()).unwrap(), field);
        }
        assert!(matches!(
            FieldName::from_wire_name("tempo"),
            Err(Error::UnknownField(_))
        ));
    }

    #[test]
    fn test_form_fields_serde_uses_wire_names() {
        let json = serde_json::to_value(FormFields::default()).unwrap();
        for field in FieldName::ALL {
            assert!(json.get(field.wire_name()).is_some(), "{} missing", field.wire_name());
        }
    }
}
