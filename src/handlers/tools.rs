//! # Tool Catalog Handlers
//!
//! Serves the static catalog the web client renders on its landing page,
//! plus the welcome route. The catalog is fixed data; search and filtering
//! happen client-side.

use actix_web::HttpResponse;
use serde::Serialize;
use serde_json::json;

/// One entry in the static tool catalog.
#[derive(Debug, Clone, Serialize)]
pub struct ToolEntry {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub tags: &'static [&'static str],
}

/// The catalog shipped to the client.
pub const TOOL_CATALOG: &[ToolEntry] = &[
    ToolEntry {
        id: "text-tools",
        title: "Text Tools",
        description: "Various text manipulation and analysis tools",
        category: "text",
        tags: &["text", "manipulation", "analysis"],
    },
    ToolEntry {
        id: "image-tools",
        title: "Image Tools",
        description: "Image processing and manipulation tools",
        category: "image",
        tags: &["image", "processing", "manipulation"],
    },
    ToolEntry {
        id: "code-tools",
        title: "Code Tools",
        description: "Development and coding utilities",
        category: "code",
        tags: &["code", "development", "utilities"],
    },
    ToolEntry {
        id: "data-tools",
        title: "Data Tools",
        description: "Data processing and analysis tools",
        category: "data",
        tags: &["data", "processing", "analysis"],
    },
];

/// `GET /api/tools` - the static catalog.
pub async fn list_tools() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "tools": TOOL_CATALOG }))
}

/// `GET /` - welcome message.
pub async fn index() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "Welcome to the Tools API" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[tokio::test]
    async fn test_catalog_shape() {
        let response = list_tools().await;
        let body = to_bytes(response.into_body()).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();

        let tools = parsed["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 4);
        for tool in tools {
            for key in ["id", "title", "description", "category", "tags"] {
                assert!(tool.get(key).is_some(), "missing {key}");
            }
        }
    }
}
