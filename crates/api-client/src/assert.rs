//! Matcher evaluation against captured responses.

use decl_e2e_core::{AssertionError, Matcher, Response};

/// Check a response-level matcher.
pub fn check(matcher: &Matcher, response: &Response) -> Result<(), AssertionError> {
    match matcher {
        Matcher::Status(expected) => {
            if response.status == *expected {
                Ok(())
            } else {
                Err(AssertionError::Status {
                    expected: *expected,
                    actual: response.status,
                })
            }
        }
        Matcher::Text(expected) => {
            if response.text == *expected {
                Ok(())
            } else {
                Err(AssertionError::Text {
                    expected: expected.clone(),
                    actual: response.text.clone(),
                })
            }
        }
        Matcher::Pattern(re) => {
            if re.is_match(&response.text) {
                Ok(())
            } else {
                Err(AssertionError::Pattern {
                    pattern: re.as_str().to_string(),
                    actual: response.text.clone(),
                })
            }
        }
        Matcher::Json(expected) => {
            if response.body == *expected {
                Ok(())
            } else {
                Err(AssertionError::Json {
                    expected: expected.clone(),
                    actual: response.body.clone(),
                })
            }
        }
        Matcher::Custom(check) => check(response).map_err(AssertionError::Custom),
    }
}

/// Check a header matcher. Text compares exactly, patterns search the value,
/// status numbers compare as decimal strings.
pub fn check_header(
    name: &str,
    matcher: &Matcher,
    response: &Response,
) -> Result<(), AssertionError> {
    let actual = response.header(name);
    let matched = match matcher {
        Matcher::Text(expected) => actual == Some(expected.as_str()),
        Matcher::Pattern(re) => actual.is_some_and(|value| re.is_match(value)),
        Matcher::Status(number) => actual == Some(number.to_string().as_str()),
        Matcher::Json(serde_json::Value::String(expected)) => actual == Some(expected.as_str()),
        Matcher::Json(_) | Matcher::Custom(_) => {
            return Err(AssertionError::UnsupportedHeaderMatcher {
                name: name.to_string(),
                matcher: matcher.to_string(),
            });
        }
    };

    if matched {
        Ok(())
    } else {
        Err(AssertionError::Header {
            name: name.to_string(),
            expected: matcher.to_string(),
            actual: actual.map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decl_e2e_core::testing::json_response;
    use serde_json::json;

    #[test]
    fn status_matcher_compares_status_code() {
        let res = json_response(503, json!({}));
        assert!(check(&Matcher::Status(503), &res).is_ok());
        assert_eq!(
            check(&Matcher::Status(200), &res),
            Err(AssertionError::Status {
                expected: 200,
                actual: 503
            })
        );
    }

    #[test]
    fn json_matcher_is_deep_equality() {
        let res = json_response(200, json!({"id": 1, "tags": ["a"]}));
        assert!(check(&Matcher::Json(json!({"tags": ["a"], "id": 1})), &res).is_ok());
        assert!(check(&Matcher::Json(json!({"id": 1})), &res).is_err());
    }

    #[test]
    fn text_and_pattern_match_raw_body() {
        let res = json_response(200, json!({"name": "ada"}));
        assert!(check(&Matcher::Text(r#"{"name":"ada"}"#.into()), &res).is_ok());
        assert!(check(&Matcher::regex("\"ada\"").expect("regex"), &res).is_ok());
        assert!(matches!(
            check(&Matcher::regex("^bob").expect("regex"), &res),
            Err(AssertionError::Pattern { .. })
        ));
    }

    #[test]
    fn custom_matcher_reports_its_message() {
        let res = json_response(200, json!([]));
        let matcher = Matcher::custom(|res| {
            if res.body.as_array().is_some_and(|items| !items.is_empty()) {
                Ok(())
            } else {
                Err("expected at least one item".to_string())
            }
        });
        assert_eq!(
            check(&matcher, &res),
            Err(AssertionError::Custom("expected at least one item".into()))
        );
    }

    #[test]
    fn header_matchers() {
        let res = json_response(200, json!({}));
        assert!(check_header("Content-Type", &Matcher::Text("application/json".into()), &res).is_ok());
        assert!(check_header("content-type", &Matcher::regex("json$").expect("regex"), &res).is_ok());
        assert_eq!(
            check_header("x-missing", &Matcher::Text("v".into()), &res),
            Err(AssertionError::Header {
                name: "x-missing".into(),
                expected: "\"v\"".into(),
                actual: None,
            })
        );
        assert!(matches!(
            check_header("content-type", &Matcher::Json(json!({"a": 1})), &res),
            Err(AssertionError::UnsupportedHeaderMatcher { .. })
        ));
    }
}
