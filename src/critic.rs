//! Prompts sent to the vision model and the fallbacks used when a call fails.

use crate::error::ServiceError;
use crate::gemini::{Part, VisionModel};
use crate::localize::{parse_percent_box, PercentBox};
use crate::retry::{retry, RetryError, RetryPolicy};

pub const LOCATE_PROMPT: &str = "Identify the main sandwich in this image. \
Provide its bounding box coordinates in the format: \
x_min, y_min, x_max, y_max (as percentages of image width/height). \
If no clear sandwich is present, respond with 'None'.";

pub const IS_SANDWICH_PROMPT: &str = "Is this an image of a sandwich? Just reply with 'Yes' or 'No'.";

pub const DESCRIBE_PROMPT: &str =
    "Describe the main food item in this image. Be concise and objective.";

pub const FILLING_PROMPT: &str = "This is an image of a sandwich. Focus only on the layers between the bread. \
Describe how evenly and symmetrically the filling ingredients (e.g., cheese, meat, vegetables) \
are distributed and aligned. Be concise and objective.";

pub const NO_FILLING_ANALYSIS: &str = "AI could not analyze filling symmetry.";
pub const COMMENT_GAVE_UP: &str = "AI comment generation failed after multiple retries.";

/// Outcome of asking the model where the subject is.
#[derive(Debug, Clone, PartialEq)]
pub enum Localization {
    Found(PercentBox),
    /// The model answered, but not with four numbers.
    Unparseable(String),
    Failed(String),
}

pub async fn locate_subject(model: &dyn VisionModel, image: &[u8], mime_type: &str) -> Localization {
    let reply = model
        .generate(vec![Part::text(LOCATE_PROMPT), Part::image(mime_type, image)])
        .await;

    match reply {
        Ok(text) => match parse_percent_box(&text) {
            Some(pct) => {
                tracing::info!("📦 Sandwich located at {:?}", pct);
                Localization::Found(pct)
            }
            None => {
                tracing::warn!("AI could not parse bounding box: {}", text);
                Localization::Unparseable(text)
            }
        },
        Err(err) => {
            tracing::error!("Error getting bounding box from AI: {}", err);
            Localization::Failed(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub is_sandwich: bool,
    pub description: String,
}

/// Asks whether the full image shows a sandwich, then describes it if so.
///
/// Once the model has said yes the verdict stands; a failed description only
/// changes the text.
pub async fn classify_subject(
    model: &dyn VisionModel,
    image: &[u8],
    mime_type: &str,
) -> Classification {
    let verdict = match model
        .generate(vec![Part::text(IS_SANDWICH_PROMPT), Part::image(mime_type, image)])
        .await
    {
        Ok(verdict) => verdict,
        Err(err) => return check_failed(false, err),
    };

    if !verdict.to_lowercase().contains("yes") {
        return Classification {
            is_sandwich: false,
            description: format!("AI identified: {}", verdict),
        };
    }

    match model
        .generate(vec![Part::text(DESCRIBE_PROMPT), Part::image(mime_type, image)])
        .await
    {
        Ok(description) => Classification {
            is_sandwich: true,
            description,
        },
        Err(err) => check_failed(true, err),
    }
}

fn check_failed(is_sandwich: bool, err: ServiceError) -> Classification {
    tracing::error!("Error during sandwich check: {}", err);
    Classification {
        is_sandwich,
        description: format!("Initial sandwich check failed: {}", err),
    }
}

pub async fn analyze_filling(model: &dyn VisionModel, cropped: &[u8], mime_type: &str) -> String {
    match model
        .generate(vec![Part::text(FILLING_PROMPT), Part::image(mime_type, cropped)])
        .await
    {
        Ok(text) => text,
        Err(err) => {
            tracing::error!("Error analyzing filling symmetry: {}", err);
            NO_FILLING_ANALYSIS.to_string()
        }
    }
}

pub fn comment_prompt(score: f64, overall: &str, filling: &str) -> String {
    format!(
        r#"
You are a sarcastic and witty food critic who only reviews the symmetry of sandwiches.
A sandwich just scored {score}/100 in a symmetry test.
Overall AI observation: "{overall}"
Detailed filling analysis: "{filling}"

Write a short, quirky, one-line review filled with humor and sass.
"#
    )
}

/// Generates the one-line review, backing off while the model reports quota exhaustion.
/// Failures come back as user-facing text rather than errors.
pub async fn generate_comment(
    model: &dyn VisionModel,
    policy: &RetryPolicy,
    score: f64,
    overall: &str,
    filling: &str,
) -> String {
    let prompt = comment_prompt(score, overall, filling);

    let outcome = retry(
        policy,
        || model.generate(vec![Part::text(prompt.clone())]),
        ServiceError::is_rate_limited,
    )
    .await;

    match outcome {
        Ok(comment) => comment,
        Err(RetryError::Fatal(err)) => {
            tracing::error!("Comment generation failed: {}", err);
            format!("AI comment generation failed: {}", err)
        }
        Err(RetryError::Exhausted { attempts, last }) => {
            tracing::error!("Comment generation gave up after {} attempts: {}", attempts, last);
            COMMENT_GAVE_UP.to_string()
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::ServiceError;
    use crate::gemini::{Part, VisionModel};

    /// Replays canned replies in order and records every prompt it was sent.
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, ServiceError>>>,
        pub prompts: Mutex<Vec<Vec<Part>>>,
    }

    impl ScriptedModel {
        pub fn new(replies: Vec<Result<String, ServiceError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl VisionModel for ScriptedModel {
        async fn generate(&self, parts: Vec<Part>) -> Result<String, ServiceError> {
            self.prompts.lock().unwrap().push(parts);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ServiceError::EmptyResponse))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }
}
