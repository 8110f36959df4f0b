use super::GradeVerdict;

/// Placeholder used when the model never produced a usable answer.
pub(crate) const UNAVAILABLE_ANSWER: &str = "unavailable";

/// Turns a raw model response into a verdict, however mangled.
///
/// Tries a strict parse of the full response, then the first
/// JSON-looking object embedded in it (code fences included). If
/// neither works the verdict is a failure carrying the raw text as its
/// explanation, so the learner still sees what came back.
pub(crate) fn parse_verdict(raw: &str) -> GradeVerdict {
    if let Ok(verdict) = serde_json::from_str::<GradeVerdict>(raw) {
        return verdict;
    }

    if let Some(embedded) = extract_json_object(raw) {
        if let Ok(verdict) = serde_json::from_str::<GradeVerdict>(&embedded) {
            return verdict;
        }
    }

    GradeVerdict {
        is_correct: false,
        correct_answer: UNAVAILABLE_ANSWER.to_string(),
        explanation: raw.trim().to_string(),
    }
}

/// Pulls the first JSON object out of a chatty response.
fn extract_json_object(response: &str) -> Option<String> {
    // A fenced ```json block wins.
    if let Some(start) = response.find("```json") {
        let after_marker = &response[start + 7..];
        if let Some(end) = after_marker.find("```") {
            return Some(after_marker[..end].trim().to_string());
        }
    }

    // Then any fenced block that contains an object.
    if let Some(start) = response.find("```") {
        let after_marker = &response[start + 3..];
        if let Some(end) = after_marker.find("```") {
            if let Some(object_start) = after_marker[..end].find('{') {
                let content = &after_marker[object_start..end];
                if !content.is_empty() {
                    return Some(content.trim().to_string());
                }
            }
        }
    }

    // Finally a bare object somewhere in the prose, matched by brace depth.
    if let Some(start) = response.find('{') {
        let mut depth = 0_i32;
        for (offset, ch) in response[start..].char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(response[start..=start + offset].to_string());
                    }
                }
                _ => {}
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_json_parses_directly() {
        let verdict = parse_verdict(
            r#"{"isCorrect": true, "correctAnswer": "ownership", "explanation": "Spot on."}"#,
        );
        assert!(verdict.is_correct);
        assert_eq!(verdict.correct_answer, "ownership");
        assert_eq!(verdict.explanation, "Spot on.");
    }

    #[test]
    fn fenced_json_block_is_extracted() {
        let raw = "Here is my assessment:\n```json\n{\"isCorrect\": false, \"correctAnswer\": \"borrowing\", \"explanation\": \"Close.\"}\n```\nHope that helps!";
        let verdict = parse_verdict(raw);
        assert!(!verdict.is_correct);
        assert_eq!(verdict.correct_answer, "borrowing");
    }

    #[test]
    fn generic_fence_with_language_tag_is_extracted() {
        let raw = "```javascript\nconst verdict = {\"isCorrect\": true, \"correctAnswer\": \"traits\", \"explanation\": \"\"}\n```";
        let verdict = parse_verdict(raw);
        assert!(verdict.is_correct);
        assert_eq!(verdict.correct_answer, "traits");
    }

    #[test]
    fn object_embedded_in_prose_is_extracted() {
        let raw = "Sure! The verdict is {\"isCorrect\": true, \"correctAnswer\": \"lifetimes\", \"explanation\": \"Well put.\"} as requested.";
        let verdict = parse_verdict(raw);
        assert!(verdict.is_correct);
        assert_eq!(verdict.explanation, "Well put.");
    }

    #[test]
    fn nested_braces_are_matched() {
        let raw = r#"Result: {"isCorrect": false, "correctAnswer": "a {closure}", "explanation": "Braces {inside} strings are fine."} done"#;
        let verdict = parse_verdict(raw);
        assert_eq!(verdict.correct_answer, "a {closure}");
    }

    #[test]
    fn missing_optional_fields_fall_back_to_defaults() {
        let verdict = parse_verdict(r#"{"isCorrect": true}"#);
        assert!(verdict.is_correct);
        assert_eq!(verdict.correct_answer, UNAVAILABLE_ANSWER);
        assert_eq!(verdict.explanation, "");
    }

    #[test]
    fn unparseable_response_becomes_a_failure_with_raw_text() {
        let verdict = parse_verdict("  I think the answer was probably right?  ");
        assert!(!verdict.is_correct);
        assert_eq!(verdict.correct_answer, UNAVAILABLE_ANSWER);
        assert_eq!(verdict.explanation, "I think the answer was probably right?");
    }

    #[test]
    fn object_without_is_correct_becomes_a_failure() {
        let raw = r#"{"grade": "A+", "comment": "nice"}"#;
        let verdict = parse_verdict(raw);
        assert!(!verdict.is_correct);
        assert_eq!(verdict.explanation, raw);
    }

    #[test]
    fn unbalanced_braces_fall_through_to_failure() {
        let verdict = parse_verdict("{\"isCorrect\": true, ");
        assert!(!verdict.is_correct);
        assert_eq!(verdict.correct_answer, UNAVAILABLE_ANSWER);
    }
}
