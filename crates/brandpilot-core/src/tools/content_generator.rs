//! ContentGenerator tool - on-brand writing instructions
//!
//! Builds a structured brief for the model to write from: the brand's
//! voice, length and platform constraints, and the requested content shape.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::ToolError;
use crate::tools::{required_str, str_arg, BoxFuture, BrandBriefStore, Tool};

const CONTENT_TYPES: &[&str] = &[
    "social_post",
    "blog_post",
    "email",
    "ad_copy",
    "product_description",
    "headline",
];

const PLATFORMS: &[&str] = &["twitter", "linkedin", "instagram", "facebook"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Length {
    Short,
    Medium,
    Long,
}

impl Length {
    /// Unknown values fall back to medium
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("short") => Length::Short,
            Some("long") => Length::Long,
            _ => Length::Medium,
        }
    }
}

/// Parsed tool arguments
struct Request<'a> {
    content_type: &'a str,
    topic: &'a str,
    platform: Option<&'a str>,
    length: Length,
    keywords: Vec<&'a str>,
    call_to_action: Option<&'a str>,
    vietnamese: bool,
    include_contact_info: bool,
    contact_info: Vec<(String, String)>,
    use_emojis: bool,
}

/// Brand fields the templates draw on
struct Brand {
    company_name: String,
    tone: String,
    usp: String,
    tagline: String,
}

impl Brand {
    fn from_brief(brief: &Value) -> Self {
        let text = |key: &str| brief.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
        let tone = match brief.get("tone_of_voice") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };
        Self {
            company_name: text("company_name"),
            tone,
            usp: text("unique_selling_proposition"),
            tagline: text("tagline"),
        }
    }
}

pub struct ContentGenerator {
    briefs: Arc<BrandBriefStore>,
}

impl ContentGenerator {
    pub fn new(briefs: Arc<BrandBriefStore>) -> Self {
        Self { briefs }
    }

    fn generate(&self, params: &Value) -> Result<String, ToolError> {
        let content_type = required_str(params, "content_type")?;
        let brief_name = required_str(params, "brief_name")?;
        let topic = required_str(params, "topic")?;

        let Some(brief) = self.briefs.get(brief_name) else {
            return Ok(format!(
                "Error: Brand brief '{}' not found. Please create a brand brief first.",
                brief_name
            ));
        };

        if !CONTENT_TYPES.contains(&content_type) {
            return Ok(format!(
                "Error: Invalid content type '{}'. Valid types are: {}.",
                content_type,
                CONTENT_TYPES.join(", ")
            ));
        }

        let platform = str_arg(params, "platform").filter(|p| !p.is_empty());
        if content_type == "social_post" {
            if let Some(platform) = platform {
                if !PLATFORMS.contains(&platform) {
                    return Ok(format!(
                        "Error: Invalid platform '{}'. Valid platforms are: {}.",
                        platform,
                        PLATFORMS.join(", ")
                    ));
                }
            }
        }

        let request = Request {
            content_type,
            topic,
            platform,
            length: Length::parse(str_arg(params, "length")),
            keywords: params
                .get("keywords")
                .and_then(Value::as_array)
                .map(|k| k.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default(),
            call_to_action: str_arg(params, "call_to_action").filter(|s| !s.is_empty()),
            vietnamese: str_arg(params, "language") == Some("vi"),
            include_contact_info: params
                .get("include_contact_info")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            contact_info: params
                .get("contact_info")
                .and_then(Value::as_object)
                .map(|m| {
                    m.iter()
                        .map(|(k, v)| (k.clone(), v.as_str().map_or_else(|| v.to_string(), str::to_string)))
                        .collect()
                })
                .unwrap_or_default(),
            use_emojis: params.get("use_emojis").and_then(Value::as_bool).unwrap_or(true),
        };

        let brand = Brand::from_brief(&brief);
        let (heading, body) = match request.content_type {
            "social_post" => ("SOCIAL POST", social_post(&brand, &request)),
            "blog_post" => ("BLOG POST", blog_post(&brand, &request)),
            "email" => ("EMAIL", email(&brand, &request)),
            "ad_copy" => ("AD COPY", ad_copy(&brand, &request)),
            "product_description" => ("PRODUCT DESCRIPTION", product_description(&brand, &request)),
            _ => ("HEADLINE", headline(&brand, &request)),
        };

        Ok(format!("{} GENERATION INSTRUCTIONS:\n{}", heading, body))
    }
}

/// Collects instruction lines, skipping empty optional ones
#[derive(Default)]
struct Lines(Vec<String>);

impl Lines {
    fn push(&mut self, line: impl Into<String>) -> &mut Self {
        self.0.push(line.into());
        self
    }

    fn push_opt(&mut self, line: Option<String>) -> &mut Self {
        if let Some(line) = line {
            self.0.push(line);
        }
        self
    }

    fn extend(&mut self, lines: &[&str]) -> &mut Self {
        self.0.extend(lines.iter().map(|l| l.to_string()));
        self
    }

    fn finish(&self) -> String {
        self.0.join("\n")
    }
}

fn voice(lines: &mut Lines, brand: &Brand) {
    lines
        .push("")
        .push("BRAND VOICE:")
        .push(format!("- Tone: {}", brand.tone))
        .push(format!("- USP: {}", brand.usp));
}

fn keyword_line(request: &Request<'_>, label: &str) -> Option<String> {
    (!request.keywords.is_empty()).then(|| format!("- {}: {}", label, request.keywords.join(", ")))
}

fn vietnamese(lines: &mut Lines, request: &Request<'_>, extra: &[&str]) {
    if request.vietnamese {
        lines.extend(&[
            "- Use Vietnamese language throughout",
            "- Consider Vietnamese cultural context and expressions",
        ]);
        lines.extend(extra);
    }
}

fn social_post(brand: &Brand, request: &Request<'_>) -> String {
    let (char_limit, features): (Option<u32>, &[&str]) = match request.platform {
        Some("twitter") => (Some(280), &["hashtags", "mentions", "link"][..]),
        Some("linkedin") => (None, &["professional tone", "industry insights", "link", "hashtags"][..]),
        Some("instagram") => (None, &["hashtags", "emojis", "visual description", "call to action"][..]),
        Some("facebook") => (None, &["engaging question", "link", "call to action", "emojis"][..]),
        _ => (None, &["engaging hook", "value proposition"][..]),
    };
    let words = match request.length {
        Length::Short => "30-50 words",
        Length::Medium => "50-100 words",
        Length::Long => "100-150 words",
    };

    let mut lines = Lines::default();
    lines.push(format!(
        "Create a {} post for {} about {}.",
        request.platform.unwrap_or("social media"),
        brand.company_name,
        request.topic
    ));
    voice(&mut lines, brand);
    lines
        .push("")
        .push("CONTENT GUIDELINES:")
        .push(format!("- Length: {}", words))
        .push_opt(char_limit.map(|c| format!("- Character limit: {} characters", c)))
        .push(format!("- Include: {}", features.join(", ")))
        .push_opt(keyword_line(request, "Keywords to include"))
        .push_opt(request.call_to_action.map(|c| format!("- Call to action: {}", c)))
        .push("- Structure: Use clear sections with visual breaks between sections")
        .push("- Formatting: Use bullet points or dashes for listing features/benefits");

    if request.use_emojis {
        lines.extend(&[
            "- Use relevant emojis to highlight key points and enhance engagement",
            "- Use emojis that align with the brand's tone and the post's message",
        ]);
    }
    if request.include_contact_info {
        lines.extend(&[
            "- Include a clear separator (like \"---\") before contact information",
            "- Structure contact info in a clean, easy-to-read format",
        ]);
        if !request.contact_info.is_empty() {
            lines.push("CONTACT INFORMATION TO INCLUDE:");
            for (key, value) in &request.contact_info {
                lines.push(format!("  - {}: {}", key, value));
            }
        }
    }
    vietnamese(&mut lines, request, &["- Use Vietnamese social media conventions and trends"]);

    lines
        .push("")
        .push("CONTENT STRUCTURE:")
        .push("1. Eye-catching headline or hook")
        .push("2. Brief introduction to the topic")
        .push("3. Key benefits or features as bullet points")
        .push("4. Strong call to action");
    if request.include_contact_info {
        lines.push("5. Contact information section");
    }
    lines.push("- Finish with relevant hashtags");
    lines.push("").push(format!(
        "Create content that resonates with {}'s target audience and reflects their brand values.",
        brand.company_name
    ));
    lines.finish()
}

fn blog_post(brand: &Brand, request: &Request<'_>) -> String {
    let (words, sections) = match request.length {
        Length::Short => ("300-500 words", 3),
        Length::Medium => ("700-1000 words", 5),
        Length::Long => ("1500-2000 words", 7),
    };

    let mut lines = Lines::default();
    lines.push(format!("Create a blog post for {} about {}.", brand.company_name, request.topic));
    voice(&mut lines, brand);
    lines
        .push("")
        .push("CONTENT STRUCTURE:")
        .push(format!("- Length: {}", words))
        .push(format!("- Include {} distinct sections with subheadings", sections))
        .push("- Include an engaging introduction and conclusion")
        .push("- Include practical tips or actionable insights")
        .push_opt(keyword_line(request, "Keywords to include"))
        .push_opt(request.call_to_action.map(|c| format!("- Call to action: {}", c)));
    vietnamese(&mut lines, request, &["- Adapt formatting, punctuation, and tone for Vietnamese readers"]);
    lines.push("").push(format!(
        "Create content that positions {} as a thought leader while providing valuable insights to their target audience.",
        brand.company_name
    ));
    lines.finish()
}

fn email(brand: &Brand, request: &Request<'_>) -> String {
    let mut lines = Lines::default();
    lines.push(format!("Create a marketing email for {} about {}.", brand.company_name, request.topic));
    voice(&mut lines, brand);
    lines
        .push("")
        .push("CONTENT STRUCTURE:")
        .push("- Include an attention-grabbing subject line")
        .push("- Include a personalized greeting")
        .push("- Clear sections with scannable content")
        .push(format!("- Strong {}", request.call_to_action.unwrap_or("call to action")))
        .push_opt(keyword_line(request, "Keywords to include"));
    vietnamese(&mut lines, request, &["- Use appropriate Vietnamese greetings and closings"]);
    lines
        .push("")
        .push("Create an email that engages the reader and encourages them to take action.");
    lines.finish()
}

fn ad_copy(brand: &Brand, request: &Request<'_>) -> String {
    let mut lines = Lines::default();
    lines.push(format!("Create advertising copy for {} about {}.", brand.company_name, request.topic));
    voice(&mut lines, brand);
    lines
        .push(format!("- Tagline: {}", brand.tagline))
        .push("")
        .push("CONTENT GUIDELINES:")
        .push("- Focus on benefits rather than features")
        .push(format!("- Include a strong {}", request.call_to_action.unwrap_or("call to action")))
        .push("- Address the target audience's pain points")
        .push_opt(keyword_line(request, "Keywords to include"));
    vietnamese(&mut lines, request, &["- Adapt messaging for Vietnamese audience preferences"]);
    lines.push("").push(format!(
        "Create compelling ad copy that drives action and highlights {}'s unique value.",
        brand.company_name
    ));
    lines.finish()
}

fn product_description(brand: &Brand, request: &Request<'_>) -> String {
    let mut lines = Lines::default();
    lines.push(format!("Create a product description for {}'s {}.", brand.company_name, request.topic));
    voice(&mut lines, brand);
    lines
        .push("")
        .push("CONTENT GUIDELINES:")
        .push("- Highlight key features and benefits")
        .push("- Address what problems it solves")
        .push("- Include sensory words to create vivid imagery")
        .push("- Include social proof or credibility indicators")
        .push_opt(keyword_line(request, "Keywords to include"));
    vietnamese(&mut lines, request, &["- Use appropriate Vietnamese product terminology"]);
    lines
        .push("")
        .push("Create a compelling product description that makes the reader want to learn more or purchase.");
    lines.finish()
}

fn headline(brand: &Brand, request: &Request<'_>) -> String {
    let mut lines = Lines::default();
    lines.push(format!(
        "Create 5-7 compelling headline options for {}'s content about {}.",
        brand.company_name, request.topic
    ));
    voice(&mut lines, brand);
    lines
        .push("")
        .push("HEADLINE GUIDELINES:")
        .push("- Include a mix of question, how-to, list-based, and curiosity-driven headlines")
        .push("- Keep each headline under 70 characters when possible")
        .push("- Ensure headlines are clear, specific, and benefit-focused")
        .push_opt(keyword_line(request, "Include key phrases where natural"));
    vietnamese(&mut lines, request, &["- Adapt headline structure for Vietnamese reading patterns"]);
    lines.push("").push(format!(
        "Create headlines that grab attention and drive interest in {}'s content.",
        brand.company_name
    ));
    lines.finish()
}

impl Tool for ContentGenerator {
    fn name(&self) -> &str {
        "content_generator"
    }

    fn description(&self) -> &str {
        "Generate instructions for on-brand content: social_post, blog_post, email, ad_copy, \
         product_description, or headline. Content is tailored to a stored brand brief and can \
         target a language such as English (en) or Vietnamese (vi)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content_type": {
                    "type": "string",
                    "enum": CONTENT_TYPES,
                    "description": "Type of content to generate"
                },
                "brief_name": {"type": "string", "description": "Name of the brand brief to use"},
                "topic": {"type": "string", "description": "Main topic or subject of the content"},
                "platform": {
                    "type": "string",
                    "enum": PLATFORMS,
                    "description": "Platform for social posts"
                },
                "length": {
                    "type": "string",
                    "enum": ["short", "medium", "long"],
                    "description": "Length of the content"
                },
                "keywords": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Keywords to include"
                },
                "call_to_action": {"type": "string", "description": "Call to action for the content"},
                "language": {"type": "string", "description": "Content language: 'en' or 'vi'"},
                "include_contact_info": {
                    "type": "boolean",
                    "description": "Whether to include a contact information section"
                },
                "contact_info": {
                    "type": "object",
                    "description": "Contact details to include (phone, email, website, address)"
                },
                "use_emojis": {"type": "boolean", "description": "Whether to use emojis"}
            },
            "required": ["content_type", "brief_name", "topic"]
        })
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, Result<String, ToolError>> {
        Box::pin(async move { self.generate(&params) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> ContentGenerator {
        ContentGenerator::new(Arc::new(BrandBriefStore::with_defaults()))
    }

    #[tokio::test]
    async fn test_social_post_for_twitter() {
        let out = generator()
            .execute(json!({
                "content_type": "social_post",
                "brief_name": "tony_tech_insights_brief",
                "topic": "phishing",
                "platform": "twitter",
                "keywords": ["security", "email"],
                "call_to_action": "Book a free audit"
            }))
            .await
            .unwrap();
        assert!(out.starts_with("SOCIAL POST GENERATION INSTRUCTIONS:\n"));
        assert!(out.contains("Create a twitter post for Tony Tech Insights about phishing."));
        assert!(out.contains("- Character limit: 280 characters"));
        assert!(out.contains("- Keywords to include: security, email"));
        assert!(out.contains("- Call to action: Book a free audit"));
        assert!(out.contains("- Tone: Professional, Approachable"));
    }

    #[tokio::test]
    async fn test_vietnamese_and_contact_info() {
        let out = generator()
            .execute(json!({
                "content_type": "social_post",
                "brief_name": "mai_phu_hung_brief",
                "topic": "nước giặt",
                "language": "vi",
                "include_contact_info": true,
                "contact_info": {"hotline": "0933.664.223"}
            }))
            .await
            .unwrap();
        assert!(out.contains("- Use Vietnamese language throughout"));
        assert!(out.contains("  - hotline: 0933.664.223"));
        assert!(out.contains("5. Contact information section"));
    }

    #[tokio::test]
    async fn test_validation_errors_are_text() {
        let r#gen = generator();
        let out = r#gen
            .execute(json!({"content_type": "poem", "brief_name": "tony_tech_insights_brief", "topic": "x"}))
            .await
            .unwrap();
        assert!(out.starts_with("Error: Invalid content type 'poem'"));

        let out = r#gen
            .execute(json!({"content_type": "blog_post", "brief_name": "ghost", "topic": "x"}))
            .await
            .unwrap();
        assert!(out.starts_with("Error: Brand brief 'ghost' not found."));

        let out = r#gen
            .execute(json!({
                "content_type": "social_post",
                "brief_name": "tony_tech_insights_brief",
                "topic": "x",
                "platform": "myspace"
            }))
            .await
            .unwrap();
        assert!(out.starts_with("Error: Invalid platform 'myspace'"));
    }

    #[tokio::test]
    async fn test_unknown_length_defaults_to_medium() {
        let out = generator()
            .execute(json!({
                "content_type": "blog_post",
                "brief_name": "tony_tech_insights_brief",
                "topic": "cloud",
                "length": "epic"
            }))
            .await
            .unwrap();
        assert!(out.starts_with("BLOG POST GENERATION INSTRUCTIONS:"));
        assert!(out.contains("- Length: 700-1000 words"));
        assert!(out.contains("- Include 5 distinct sections with subheadings"));
    }
}
