use jsonschema::JSONSchema;
use serde_json::{json, Value};

use super::ExtractionError;

pub const EXTRACTION_PROMPT: &str = r#"Você é um sistema de extração de dados de DARF (Documento de Arrecadação de Receitas Federais).
Analise o documento anexo e devolva somente JSON, exatamente no esquema informado.
- headerTotal: valor total do documento (campo "Valor Total" do cabeçalho)
- items: uma entrada por linha da composição do documento, na ordem em que aparecem
  - code: código da receita, como impresso
  - description: denominação da receita
  - principal, multa, juros, total: valores numéricos, use ponto como separador decimal
Valores ausentes devem ser 0."#;

/// Schema sent to the model (OpenAPI subset accepted by `responseSchema`).
pub fn response_schema() -> Value {
    let amount = json!({"type": "NUMBER"});
    json!({
        "type": "OBJECT",
        "properties": {
            "headerTotal": amount,
            "items": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "code": {"type": "STRING"},
                        "description": {"type": "STRING"},
                        "principal": amount,
                        "multa": amount,
                        "juros": amount,
                        "total": amount
                    },
                    "required": ["code", "principal", "multa", "juros", "total"]
                }
            }
        },
        "required": ["headerTotal", "items"]
    })
}

// Plain decimals or pt-BR text such as "R$ 1.234,56"; no sign.
const AMOUNT_TEXT_PATTERN: &str = r"^\s*(R\$\s*)?[0-9][0-9.]*(,[0-9]+)?\s*$";

fn validation_schema() -> Value {
    let amount = json!({
        "anyOf": [
            {"type": "number", "minimum": 0},
            {"type": "string", "pattern": AMOUNT_TEXT_PATTERN}
        ]
    });
    json!({
        "type": "object",
        "required": ["headerTotal", "items"],
        "properties": {
            "headerTotal": amount,
            "items": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["code", "principal", "multa", "juros", "total"],
                    "properties": {
                        "code": {"type": "string"},
                        "description": {"type": ["string", "null"]},
                        "principal": amount,
                        "multa": amount,
                        "juros": amount,
                        "total": amount
                    }
                }
            }
        }
    })
}

/// Checks model output before it is deserialized.
pub struct ResponseValidator {
    schema: JSONSchema,
}

impl ResponseValidator {
    pub fn new() -> Result<Self, ExtractionError> {
        let schema = JSONSchema::compile(&validation_schema())
            .map_err(|e| ExtractionError::Schema(format!("invalid validation schema: {}", e)))?;
        Ok(Self { schema })
    }

    pub fn validate(&self, value: &Value) -> Result<(), ExtractionError> {
        if let Err(errors) = self.schema.validate(value) {
            let message = errors
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ExtractionError::Schema(message));
        }
        Ok(())
    }
}

/// Parses the model's text part, tolerating a ```json fence around it.
pub fn parse_model_text(raw: &str) -> Result<Value, ExtractionError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    if body.is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }
    serde_json::from_str::<Value>(body).map_err(|e| ExtractionError::InvalidJson(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_complete_output() {
        let validator = ResponseValidator::new().unwrap();
        let value = json!({
            "headerTotal": 10.5,
            "items": [{"code": "1082", "principal": 10, "multa": 0, "juros": 0.5, "total": 10.5}]
        });
        assert!(validator.validate(&value).is_ok());
    }

    #[test]
    fn rejects_missing_fields() {
        let validator = ResponseValidator::new().unwrap();
        let value = json!({
            "headerTotal": 10.5,
            "items": [{"code": "1082", "principal": 10, "total": 10.5}]
        });
        let err = validator.validate(&value).unwrap_err();
        assert!(matches!(err, ExtractionError::Schema(msg) if msg.contains("multa")));

        assert!(validator.validate(&json!({"items": []})).is_err());
    }

    #[test]
    fn rejects_unreadable_or_negative_amounts() {
        let validator = ResponseValidator::new().unwrap();
        let text = json!({
            "headerTotal": "N/A",
            "items": [{"code": "1082", "principal": "ilegível", "multa": 0, "juros": 0, "total": "ilegível"}]
        });
        assert!(matches!(validator.validate(&text), Err(ExtractionError::Schema(_))));

        let negative = json!({
            "headerTotal": 10,
            "items": [{"code": "1082", "principal": 10, "multa": 0, "juros": 0, "total": -10}]
        });
        assert!(validator.validate(&negative).is_err());

        let localized = json!({
            "headerTotal": "R$ 1.234,56",
            "items": [{"code": "1082", "principal": "1234.56", "multa": "0", "juros": 0, "total": "1.234,56"}]
        });
        assert!(validator.validate(&localized).is_ok());
    }

    #[test]
    fn strips_code_fences() {
        let value = parse_model_text("```json\n{\"headerTotal\": 1, \"items\": []}\n```").unwrap();
        assert_eq!(value["headerTotal"], 1);

        let value = parse_model_text("  {\"a\": true}  ").unwrap();
        assert_eq!(value["a"], true);
    }

    #[test]
    fn garbage_is_invalid_json() {
        assert!(matches!(parse_model_text("sorry, I can't"), Err(ExtractionError::InvalidJson(_))));
        assert!(matches!(parse_model_text("   "), Err(ExtractionError::EmptyResponse)));
    }
}
