#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Local,
    Demo,
    Groq,
    OpenAI,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::Demo => "demo",
            Provider::Groq => "groq",
            Provider::OpenAI => "openai",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Some(Provider::Local),
            "demo" => Some(Provider::Demo),
            "groq" => Some(Provider::Groq),
            "openai" => Some(Provider::OpenAI),
            _ => None,
        }
    }

    pub fn all() -> Vec<Provider> {
        vec![Provider::Local, Provider::Demo, Provider::Groq, Provider::OpenAI]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Local => "CityHub (Local)",
            Provider::Demo => "Demo API (latency test)",
            Provider::Groq => "Groq",
            Provider::OpenAI => "ChatGPT (OpenAI)",
        }
    }

    /// Where requests go when nothing overrides it
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Provider::Local => "http://localhost:9100/askcityhub",
            Provider::Demo => "https://dummyjson.com/posts/add",
            Provider::Groq => "https://api.groq.com/openai/v1",
            Provider::OpenAI => "https://api.openai.com/v1",
        }
    }

    pub fn default_model(&self) -> Option<&'static str> {
        match self {
            Provider::Groq => Some("llama3-8b-8192"),
            Provider::OpenAI => Some("gpt-4o-mini"),
            Provider::Local | Provider::Demo => None,
        }
    }

    /// Environment variable holding the provider's API key, if it needs one
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Provider::Groq => Some("GROQ_API_KEY"),
            Provider::OpenAI => Some("OPENAI_API_KEY"),
            Provider::Local | Provider::Demo => None,
        }
    }

    pub fn names() -> String {
        Self::all()
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
