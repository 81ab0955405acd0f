#[cfg(test)]
mod tests {
    use crate::schemas::ApiDoc;
    use utoipa::OpenApi;
    use utoipa::openapi::PathItemType;

    #[test]
    fn test_openapi_schema_generation() {
        let openapi = ApiDoc::openapi();

        assert!(openapi.components.is_some());
        let components = openapi.components.as_ref().unwrap();

        for schema in [
            "ErrorResponse",
            "HealthResponse",
            "ProductFilter",
            "ProductResponse",
            "ToggleResult",
            "UserResponse",
            "ProfileResponse",
        ] {
            assert!(
                components.schemas.contains_key(schema),
                "missing schema {schema}"
            );
        }

        let json_result = serde_json::to_string(&openapi);
        assert!(json_result.is_ok());
    }

    #[test]
    fn test_error_response_schema_structure() {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.as_ref().unwrap();
        let error_response_schema = components.schemas.get("ErrorResponse").unwrap();

        if let utoipa::openapi::RefOr::T(utoipa::openapi::schema::Schema::Object(obj)) =
            error_response_schema
        {
            let properties = &obj.properties;
            assert!(properties.contains_key("error"));
            assert!(properties.contains_key("code"));
            assert!(properties.contains_key("success"));
            assert!(properties.contains_key("fields"));
        } else {
            panic!("ErrorResponse should be an object schema");
        }
    }

    #[test]
    fn test_product_filter_uses_camel_case() {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.as_ref().unwrap();
        let filter_schema = components.schemas.get("ProductFilter").unwrap();

        if let utoipa::openapi::RefOr::T(utoipa::openapi::schema::Schema::Object(obj)) =
            filter_schema
        {
            let properties = &obj.properties;
            assert!(properties.contains_key("priceRange"));
            assert!(properties.contains_key("sortBy"));
            assert!(properties.contains_key("category"));
            assert!(properties.contains_key("search"));
        } else {
            panic!("ProductFilter should be an object schema");
        }
    }

    #[test]
    fn test_every_route_is_documented() {
        let openapi = ApiDoc::openapi();
        let paths = &openapi.paths.paths;

        let expected = [
            ("/health", PathItemType::Get, "GET"),
            ("/signup", PathItemType::Post, "POST"),
            ("/login", PathItemType::Post, "POST"),
            ("/logout", PathItemType::Post, "POST"),
            ("/products", PathItemType::Get, "GET"),
            ("/products", PathItemType::Post, "POST"),
            ("/products/filter", PathItemType::Post, "POST"),
            ("/products/{product_id}", PathItemType::Get, "GET"),
            ("/products/{product_id}", PathItemType::Delete, "DELETE"),
            ("/products/{product_id}/images", PathItemType::Post, "POST"),
            ("/products/{product_id}/toggle-popularity", PathItemType::Post, "POST"),
            ("/categories", PathItemType::Get, "GET"),
            ("/max-price", PathItemType::Get, "GET"),
            ("/profile", PathItemType::Get, "GET"),
            ("/profile", PathItemType::Put, "PUT"),
        ];

        for (path, method, label) in expected {
            let item = paths
                .get(path)
                .unwrap_or_else(|| panic!("missing path {path}"));
            assert!(
                item.operations.contains_key(&method),
                "missing {label} {path}"
            );
        }
    }

    #[test]
    fn test_protected_operations_declare_bearer_security() {
        let openapi = ApiDoc::openapi();

        let components = openapi.components.as_ref().unwrap();
        assert!(components.security_schemes.contains_key("token"));

        let logout = openapi
            .paths
            .paths
            .get("/logout")
            .and_then(|item| item.operations.get(&PathItemType::Post))
            .unwrap();
        assert!(logout.security.is_some());

        let responses = &logout.responses.responses;
        assert!(responses.contains_key("200"));
        assert!(responses.contains_key("401"));
    }

    #[test]
    fn test_all_error_responses_reference_correct_schema() {
        let openapi = ApiDoc::openapi();
        let openapi_json = serde_json::to_string(&openapi).unwrap();

        assert!(!openapi_json.contains("crate.schemas.ErrorResponse"));
        assert!(!openapi_json.contains("crate::schemas::ErrorResponse"));
        assert!(openapi_json.contains("ErrorResponse"));
    }
}
