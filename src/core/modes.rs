use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::api::ResponseFormat;

const PHYSICS_SYSTEM: &str = "You are a tutor expert in physics and maths. Format all equations, formulas in latex when possible";
const JAVASCRIPT_SYSTEM: &str = "You are a developer expert in the javascript programing language. Write code examples when required";
const GRADER_SYSTEM: &str = "You are a grader assessing the customer satisfation based on customer comments. Give a numeric score between 0 and 10 to indicate the customer satisfaction. Respond following this JSON format: { \"score\": number }";

/// Prompting mode selected on the input surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Mode {
    #[default]
    General,
    Physics,
    Javascript,
    Grader,
}

/// What the generation client needs to know about a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateProps {
    pub mode: Mode,
    pub system: String,
    pub prompt: String,
    pub format: Option<ResponseFormat>,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::General, Mode::Physics, Mode::Javascript, Mode::Grader];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::General => "general",
            Mode::Physics => "physics",
            Mode::Javascript => "javascript",
            Mode::Grader => "grader",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Mode::General => "General",
            Mode::Physics => "Physics",
            Mode::Javascript => "Javascript",
            Mode::Grader => "Grader",
        }
    }

    pub fn system_prompt(self) -> &'static str {
        match self {
            Mode::General => "",
            Mode::Physics => PHYSICS_SYSTEM,
            Mode::Javascript => JAVASCRIPT_SYSTEM,
            Mode::Grader => GRADER_SYSTEM,
        }
    }

    /// Build the request for `question` in this mode.
    pub fn props(self, question: &str) -> GenerateProps {
        let (prompt, format) = match self {
            Mode::Grader => (
                format!("Here is the customer comment: {question}"),
                Some(ResponseFormat::Json),
            ),
            _ => (question.to_string(), None),
        };

        GenerateProps {
            mode: self,
            system: self.system_prompt().to_string(),
            prompt,
            format,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Mode {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(Mode::General),
            "physics" => Ok(Mode::Physics),
            "javascript" | "js" => Ok(Mode::Javascript),
            "grader" | "grading" => Ok(Mode::Grader),
            _ => Err(format!(
                "invalid mode: {value} (expected one of: general, physics, javascript, grader)"
            )),
        }
    }
}

impl TryFrom<String> for Mode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl From<Mode> for String {
    fn from(value: Mode) -> Self {
        value.as_str().to_string()
    }
}

/// Extract the `score` a grader response carries.
///
/// Models asked for JSON sometimes wrap it in a fenced block, so when the
/// whole text is not JSON the first and last lines are dropped and the rest
/// is tried again.
pub fn parse_grader_score(text: &str) -> Option<f64> {
    fn score_of(candidate: &str) -> Option<f64> {
        let value: serde_json::Value = serde_json::from_str(candidate.trim()).ok()?;
        value.get("score")?.as_f64()
    }

    if let Some(score) = score_of(text) {
        return Some(score);
    }

    let lines: Vec<&str> = text.trim().lines().collect();
    if lines.len() < 3 {
        return None;
    }
    score_of(&lines[1..lines.len() - 1].join("\n"))
}

/// Map a 0-10 grader score onto a 0-5 rating with half-star precision.
pub fn score_to_stars(score: f64) -> f64 {
    let stars = (score / 2.0).clamp(0.0, 5.0);
    (stars * 2.0).round() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_mode_sends_question_verbatim() {
        let props = Mode::General.props("Why is the sky blue?");
        assert_eq!(props.mode, Mode::General);
        assert_eq!(props.system, "");
        assert_eq!(props.prompt, "Why is the sky blue?");
        assert_eq!(props.format, None);
    }

    #[test]
    fn grader_mode_wraps_comment_and_requests_json() {
        let props = Mode::Grader.props("Delivery was late but support was nice");
        assert_eq!(
            props.prompt,
            "Here is the customer comment: Delivery was late but support was nice"
        );
        assert_eq!(props.format, Some(ResponseFormat::Json));
        assert!(props.system.contains("\"score\""));
    }

    #[test]
    fn tutor_modes_carry_system_prompts() {
        assert!(Mode::Physics.props("x").system.contains("latex"));
        assert!(Mode::Javascript.props("x").system.contains("javascript"));
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Physics".parse::<Mode>(), Ok(Mode::Physics));
        assert_eq!("js".parse::<Mode>(), Ok(Mode::Javascript));
        assert_eq!("grading".parse::<Mode>(), Ok(Mode::Grader));
        assert!("poetry".parse::<Mode>().is_err());

        for mode in Mode::ALL {
            assert_eq!(mode.as_str().parse::<Mode>(), Ok(mode));
        }
    }

    #[test]
    fn grader_score_from_plain_or_fenced_json() {
        assert_eq!(parse_grader_score(r#"{ "score": 7 }"#), Some(7.0));
        assert_eq!(
            parse_grader_score("```json\n{ \"score\": 4.5 }\n```"),
            Some(4.5)
        );
        assert_eq!(parse_grader_score("I would say 8"), None);
        assert_eq!(parse_grader_score(r#"{ "rating": 7 }"#), None);
    }

    #[test]
    fn stars_are_clamped_half_steps() {
        assert_eq!(score_to_stars(7.0), 3.5);
        assert_eq!(score_to_stars(8.4), 4.0);
        assert_eq!(score_to_stars(12.0), 5.0);
        assert_eq!(score_to_stars(-3.0), 0.0);
    }
}
