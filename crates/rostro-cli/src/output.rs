//! Plain-text and JSON rendering of registry data.

use rostro_core::{PersonRecord, Similarity, Url};
use serde_json::{json, Value};

fn status(record: &PersonRecord) -> &'static str {
    if record.requisitioned {
        "REQUISITIONED"
    } else {
        "normal"
    }
}

pub fn person(record: &PersonRecord, image: &Url) -> String {
    format!(
        "ID:     {}\nName:   {}\nEmail:  {}\nStatus: {}\nImage:  {}",
        record.user_id,
        record.full_name(),
        record.email,
        status(record),
        image
    )
}

pub fn person_json(record: &PersonRecord, image: &Url) -> Value {
    json!({
        "user_id": record.user_id,
        "name": record.name,
        "last_name": record.last_name,
        "email": record.email,
        "requisitioned": record.requisitioned,
        "image_url": image.as_str(),
    })
}

/// One line per person, in registry order.
pub fn people_table(people: &[PersonRecord]) -> String {
    if people.is_empty() {
        return "No people enrolled".to_string();
    }
    let id_width = people.iter().map(|p| p.user_id.len()).max().unwrap_or(0).max(2);
    people
        .iter()
        .map(|p| {
            format!(
                "{:<id_width$}  {:<13}  {} <{}>",
                p.user_id,
                status(p),
                p.full_name(),
                p.email
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn match_found(
    submitted: &str,
    stored_image: &Url,
    similarity: Similarity,
    record: &PersonRecord,
) -> String {
    format!(
        "Match found ({similarity} similarity)\nSubmitted: {submitted}\n{}",
        person(record, stored_image)
    )
}

pub fn match_json(
    submitted: &str,
    stored_image: &Url,
    similarity: Similarity,
    record: &PersonRecord,
) -> Value {
    json!({
        "outcome": "match",
        "submitted_image": submitted,
        "similarity": similarity.raw(),
        "similarity_percent": similarity.percent(),
        "person": person_json(record, stored_image),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user_id: &str, requisitioned: bool) -> PersonRecord {
        PersonRecord {
            user_id: user_id.into(),
            name: "Ana".into(),
            last_name: "Quispe".into(),
            email: "ana@example.com".into(),
            requisitioned,
        }
    }

    fn url(user_id: &str) -> Url {
        Url::parse(&format!("http://127.0.0.1:8000/api/usuario/{user_id}/imagen")).unwrap()
    }

    #[test]
    fn test_person_block() {
        let text = person(&record("42", true), &url("42"));
        assert!(text.contains("ID:     42"));
        assert!(text.contains("Name:   Ana Quispe"));
        assert!(text.contains("Status: REQUISITIONED"));
        assert!(text.ends_with("/api/usuario/42/imagen"));
    }

    #[test]
    fn test_people_table_keeps_order() {
        let table = people_table(&[record("10", false), record("2", true)]);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("10  normal"));
        assert!(lines[1].starts_with("2   REQUISITIONED"));
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(people_table(&[]), "No people enrolled");
    }

    #[test]
    fn test_match_rendering() {
        let similarity = Similarity::new(0.8734).unwrap();
        let text = match_found("/tmp/a.jpg", &url("42"), similarity, &record("42", false));
        assert!(text.starts_with("Match found (87.34% similarity)"));

        let value = match_json("/tmp/a.jpg", &url("42"), similarity, &record("42", false));
        assert_eq!(value["similarity_percent"], 87.34);
        assert_eq!(value["person"]["user_id"], "42");
    }
}
