//! HTTP API for Turkish bill OCR and analysis.
//!
//! - `GET /` and `GET /health` for status
//! - `POST /process-bill` and `POST /extract-text` for the classical OCR pipeline
//! - `POST /extract` for structured extraction over supplied text
//! - `POST /analyze-bill` for the vision model

pub mod error;
mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;

use std::net::SocketAddr;

use fatura_core::Settings;

/// Start the web server.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let state = AppState::from_settings(&settings)?;
    let app = create_router(state, &settings.server.cors_origins);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use fatura_core::{ImageSection, UploadPolicy};
    use fatura_ocr::{BillPipeline, MockRecognizer, StructuredExtractor};
    use fatura_vision::{BillAnalyzer, MockVisionBackend};
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use std::io::Cursor;
    use tower::ServiceExt;

    const BOUNDARY: &str = "fatura-test-boundary";

    fn tiny_png() -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(4, 4, |_, _| Luma([200u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn app_with(ocr_text: &str, vision_reply: Option<&str>, policy: UploadPolicy) -> axum::Router {
        let pipeline = BillPipeline::new(
            vec![Box::new(MockRecognizer::new(ocr_text).with_name("tesseract"))],
            StructuredExtractor::default(),
        );
        let analyzer = vision_reply.map(|reply| {
            BillAnalyzer::new(MockVisionBackend::new(reply), policy.clone(), ImageSection::default())
                .into_dyn()
        });
        let state = AppState::new(pipeline, analyzer, policy);
        create_router(state, &["http://localhost:3000".to_string()])
    }

    fn app() -> axum::Router {
        app_with("SÜT 1 LT 24,50 TL\n12.05.2024", None, UploadPolicy::default())
    }

    fn multipart(uri: &str, filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_root() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["message"], "Turkish Bill OCR API");
        assert_eq!(json["status"], "running");
    }

    #[tokio::test]
    async fn test_health_reports_engines() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["ocr_available"]["tesseract"], true);
        assert_eq!(json["vision_available"], false);
    }

    #[tokio::test]
    async fn test_process_bill() {
        let response = app()
            .oneshot(multipart("/process-bill", "fis.png", "image/png", &tiny_png()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["filename"], "fis.png");

        let result = &json["result"];
        assert_eq!(result["raw_text"]["tesseract"], "SÜT 1 LT 24,50 TL\n12.05.2024");
        assert_eq!(result["extracted_data"]["dates"][0], "12.05.2024");
        assert_eq!(result["extracted_data"]["item_count"], 1);
        assert!(result["extracted_data"]["total_calculated"].is_number());
        assert_eq!(result["processing_info"]["ocr_engines_used"][0], "tesseract");
    }

    #[tokio::test]
    async fn test_process_bill_rejects_non_image() {
        let response = app()
            .oneshot(multipart("/process-bill", "notes.txt", "text/plain", b"hello"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["detail"], "File must be an image");
    }

    #[tokio::test]
    async fn test_process_bill_rejects_oversize_file() {
        let app = app_with("", None, UploadPolicy::new(16, vec![".png".into()]));
        let response = app
            .oneshot(multipart("/process-bill", "fis.png", "image/png", &[0u8; 64]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
        assert!(detail.starts_with("File too large"));
    }

    #[tokio::test]
    async fn test_process_bill_undecodable_image_is_500() {
        let response = app()
            .oneshot(multipart("/process-bill", "fis.png", "image/png", b"not really a png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
        assert!(detail.starts_with("Error processing image"));
    }

    #[tokio::test]
    async fn test_extract_text() {
        let response = app()
            .oneshot(multipart("/extract-text", "fis.png", "image/png", &tiny_png()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["text"]["tesseract"], "SÜT 1 LT 24,50 TL\n12.05.2024");
    }

    #[tokio::test]
    async fn test_extract_from_json_text() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/extract")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"text": "12,50 tl"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["amounts"].as_array().unwrap().len(), 3);
        assert_eq!(json["total_calculated"], 75.0);
        assert_eq!(json["item_count"], 0);
    }

    #[tokio::test]
    async fn test_missing_file_field() {
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nx\r\n--{BOUNDARY}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/extract-text")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["detail"], "Missing 'file' field");
    }

    #[tokio::test]
    async fn test_analyze_bill_without_key_is_unavailable() {
        let response = app()
            .oneshot(multipart("/analyze-bill", "fis.png", "image/png", &tiny_png()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_analyze_bill() {
        let app = app_with("", Some(r#"{"dates": ["12.05.2024"], "items": []}"#), UploadPolicy::default());
        let response = app
            .oneshot(multipart("/analyze-bill", "fis.png", "image/png", &tiny_png()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["result"]["model"], "mock-vision");
        assert_eq!(json["result"]["extracted_data"]["dates"][0], "12.05.2024");
    }

    #[tokio::test]
    async fn test_analyze_bill_rejects_unsupported_extension() {
        let app = app_with("", Some("{}"), UploadPolicy::default());
        let response = app
            .oneshot(multipart("/analyze-bill", "fis.gif", "image/gif", b"GIF89a"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["detail"], "Unsupported file format: .gif");
    }
}
