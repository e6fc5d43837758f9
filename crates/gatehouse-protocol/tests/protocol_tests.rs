//! Protocol layer tests: faults, messages, routes, configuration.

#[cfg(test)]
mod tests {
    use gatehouse_protocol::config::DEFAULT_CERTIFICATE_SUBJECT;
    use gatehouse_protocol::*;
    use http::{Method, StatusCode};
    use serde_json::json;

    // ─────────────────────────────────────────────────────────────────────
    // Faults
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn fault_codes_map_to_http_status() {
        assert_eq!(FaultCode::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(FaultCode::MethodNotAllowed.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(FaultCode::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(FaultCode::ServerShuttingDown.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(FaultCode::InspectorFailed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(FaultCode::Custom(-1).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn fault_code_from_code_is_inverse() {
        for code in [
            FaultCode::NotFound,
            FaultCode::MethodNotAllowed,
            FaultCode::Unauthenticated,
            FaultCode::InspectorFailed,
            FaultCode::ServerNotInitialized,
            FaultCode::ServerShuttingDown,
            FaultCode::Internal,
        ] {
            assert_eq!(FaultCode::from_code(code.code()), code);
        }
        assert_eq!(FaultCode::from_code(-1), FaultCode::Custom(-1));
    }

    #[test]
    fn fault_body_wraps_fault_object() {
        let fault = Fault::not_found("/api/nope");
        let body = fault.to_body();
        assert_eq!(body["fault"]["code"], json!(FaultCode::NotFound.code()));
        assert_eq!(body["fault"]["message"], "No operation at /api/nope");
        assert!(body["fault"].get("data").is_none());
    }

    #[test]
    fn fault_with_data_serializes_data() {
        let fault = Fault::internal("boom").with_data(json!({"detail": 1}));
        assert_eq!(fault.to_body()["fault"]["data"]["detail"], 1);
    }

    #[test]
    fn fault_display() {
        let fault = Fault::unauthenticated("nope");
        assert_eq!(fault.to_string(), format!("Fault [{}]: nope", FaultCode::Unauthenticated.code()));
    }

    #[test]
    fn custom_code_colliding_with_reserved_keeps_its_kind() {
        let fault = Fault::new(FaultCode::Custom(-32601), "not a routing fault");
        assert_eq!(fault.code, -32601);
        assert_eq!(fault.fault_code(), FaultCode::Custom(-32601));
        assert_eq!(fault.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(fault.to_body()["fault"].get("kind").is_none());
    }

    #[test]
    fn deserialized_fault_maps_code_back() {
        let fault: Fault =
            serde_json::from_value(json!({"code": -32601, "message": "gone"})).unwrap();
        assert_eq!(fault.fault_code(), FaultCode::NotFound);
        assert_eq!(fault.status(), StatusCode::NOT_FOUND);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Messages
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn request_header_lookup_is_case_insensitive() {
        let req = InboundRequest::new(Method::GET, "/api/test")
            .with_header("Origin", "http://localhost:3000");
        assert_eq!(req.header("origin"), Some("http://localhost:3000"));
        assert_eq!(req.header("ORIGIN"), Some("http://localhost:3000"));
        assert_eq!(req.header("referer"), None);
    }

    #[test]
    fn response_json_sets_content_type() {
        let resp = OutboundResponse::json(&json!("hi"));
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.header("content-type"), Some("application/json"));
        assert_eq!(&resp.body[..], b"\"hi\"");
    }

    #[test]
    fn response_set_header_overwrites() {
        let mut resp = OutboundResponse::empty(StatusCode::NO_CONTENT);
        resp.set_header(http::header::ACCESS_CONTROL_ALLOW_ORIGIN, "a").unwrap();
        resp.set_header(http::header::ACCESS_CONTROL_ALLOW_ORIGIN, "b").unwrap();
        assert_eq!(resp.headers.get_all("access-control-allow-origin").iter().count(), 1);
        assert_eq!(resp.header("access-control-allow-origin"), Some("b"));
    }

    #[test]
    fn response_from_fault_uses_fault_status() {
        let resp = OutboundResponse::fault(&Fault::shutting_down());
        assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(body["fault"]["message"], "Server is shutting down");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Routes
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn operation_paths_join_endpoint() {
        assert_eq!(Routes::operation(Routes::TEST), "/api/test");
        assert_eq!(Routes::operation("test"), "/api/test");
    }

    #[test]
    fn endpoint_path_detection() {
        assert!(Routes::is_endpoint_path("/api"));
        assert!(Routes::is_endpoint_path("/api/test"));
        assert!(!Routes::is_endpoint_path("/apix"));
        assert!(!Routes::is_endpoint_path("/health"));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Configuration
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn config_parses_kestrel_section() {
        let cfg = HostConfig::from_json(
            r#"{"Kestrel": {"Port": 8443, "CertificateSubject": "my-host"}, "Logging": {}}"#,
            "inline",
        )
        .unwrap();
        assert_eq!(cfg.kestrel.port, 8443);
        assert_eq!(cfg.kestrel.certificate_subject(), "my-host");
    }

    #[test]
    fn config_subject_falls_back_to_default() {
        let cfg = HostConfig::from_json(r#"{"Kestrel": {"Port": 8080}}"#, "inline").unwrap();
        assert_eq!(cfg.kestrel.certificate_subject, None);
        assert_eq!(cfg.kestrel.certificate_subject(), DEFAULT_CERTIFICATE_SUBJECT);
    }

    #[test]
    fn config_missing_section_is_error() {
        let err = HostConfig::from_json(r#"{"Logging": {}}"#, "inline").unwrap_err();
        assert!(matches!(err, ConfigError::MissingSection("Kestrel")));
    }

    #[test]
    fn config_invalid_json_is_parse_error() {
        let err = HostConfig::from_json("{not json", "inline").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn settings_file_depends_on_environment() {
        assert_eq!(HostConfig::settings_file_name(None), "appsettings.json");
        assert_eq!(HostConfig::settings_file_name(Some("Production")), "appsettings.json");
        assert_eq!(
            HostConfig::settings_file_name(Some("Development")),
            "appsettings.Development.json"
        );
    }

    #[test]
    fn load_for_environment_reads_matching_file() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("appsettings.json"), r#"{"Kestrel": {"Port": 1}}"#).unwrap();
        std::fs::write(
            dir.path().join("appsettings.Development.json"),
            r#"{"Kestrel": {"Port": 2}}"#,
        )
        .unwrap();

        let prod = HostConfig::load_for_environment(dir.path(), None).unwrap();
        let dev = HostConfig::load_for_environment(dir.path(), Some("Development")).unwrap();
        assert_eq!(prod.kestrel.port, 1);
        assert_eq!(dev.kestrel.port, 2);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = HostConfig::load_for_environment(dir.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
