use crate::catalog;
use crate::error::{Result, SurveyError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One field visit to an agency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    pub id: i64,
    pub user_id: i64,
    pub agency_name: String,
    pub prefix: String,
    pub manager_name: String,
    pub registration: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSurvey {
    pub agency_name: String,
    pub prefix: String,
    pub manager_name: String,
    pub registration: String,
}

impl NewSurvey {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("agency_name", &self.agency_name),
            ("prefix", &self.prefix),
            ("manager_name", &self.manager_name),
            ("registration", &self.registration),
        ] {
            if value.trim().is_empty() {
                return Err(SurveyError::validation(format!("{} is required", field)));
            }
        }
        Ok(())
    }
}

/// A named room/area inside a survey
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub id: i64,
    pub survey_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEnvironment {
    pub survey_id: i64,
    pub name: String,
}

/// Photo category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Wide shot of the environment
    VistaAmpla,
    /// A specific service or item
    ServicosItens,
    /// Close-up detail
    Detalhes,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::VistaAmpla => "vista_ampla",
            Classification::ServicosItens => "servicos_itens",
            Classification::Detalhes => "detalhes",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Painting measurements as entered on the dimensions form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaintingDimensions {
    pub width: String,
    pub height: String,
    pub area: String,
}

impl PaintingDimensions {
    /// Build the payload from the raw form inputs, deriving the area.
    /// Unparseable input yields an area of "0".
    pub fn confirm(width: &str, height: &str) -> Self {
        let area = match (parse_decimal(width), parse_decimal(height)) {
            (Some(w), Some(h)) => compute_area(w, h)
                .map(format_area)
                .unwrap_or_else(|| "0".to_string()),
            _ => "0".to_string(),
        };

        Self {
            width: width.trim().to_string(),
            height: height.trim().to_string(),
            area,
        }
    }

    /// Numeric area, if the stored text parses
    pub fn area_value(&self) -> Option<f64> {
        parse_decimal(&self.area)
    }
}

/// Parse user input that may use a comma as decimal separator.
///
/// Reads the longest leading number and ignores what follows, so "3,5m"
/// is 3.5. Input with no leading digits, or a non-finite value, is `None`.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let normalized = text.trim().replacen(',', ".", 1);
    let number = &normalized[..numeric_prefix_len(normalized.as_bytes())];
    if number.is_empty() {
        return None;
    }
    number.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Length of the leading `[+-]digits[.digits][e[+-]digits]` run, or 0
fn numeric_prefix_len(bytes: &[u8]) -> usize {
    let digits_from = |start: usize| {
        bytes[start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut end = match bytes.first() {
        Some(b'+') | Some(b'-') => 1,
        _ => 0,
    };
    let whole = digits_from(end);
    end += whole;

    let mut fraction = 0;
    if bytes.get(end) == Some(&b'.') {
        fraction = digits_from(end + 1);
        if whole + fraction > 0 {
            end += 1 + fraction;
        }
    }
    if whole + fraction == 0 {
        return 0;
    }

    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'+') | Some(b'-')) {
            exponent += 1;
        }
        let digits = digits_from(exponent);
        if digits > 0 {
            end = exponent + digits;
        }
    }
    end
}

/// Width × height rounded to two decimals
pub fn compute_area(width: f64, height: f64) -> Option<f64> {
    let area = width * height;
    if !area.is_finite() {
        return None;
    }
    Some((area * 100.0).round() / 100.0)
}

/// Two-decimal display form with a comma separator ("9,80")
pub fn format_area(area: f64) -> String {
    format!("{:.2}", area).replace('.', ",")
}

/// A persisted photo record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: i64,
    pub environment_id: i64,
    pub image_url: String,
    pub observation: Option<String>,
    pub photo_type: Classification,
    #[serde(default)]
    pub service_item: Option<String>,
    pub painting_dimensions: Option<PaintingDimensions>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPhoto {
    pub environment_id: i64,
    pub image_url: String,
    #[serde(default)]
    pub observation: Option<String>,
    pub photo_type: Classification,
    #[serde(default)]
    pub service_item: Option<String>,
    #[serde(default)]
    pub painting_dimensions: Option<PaintingDimensions>,
}

impl NewPhoto {
    pub fn validate(&self) -> Result<()> {
        if self.image_url.trim().is_empty() {
            return Err(SurveyError::validation("image_url is required"));
        }

        check_service_payload(
            self.photo_type,
            self.service_item.as_deref(),
            self.painting_dimensions.as_ref(),
        )
    }
}

/// Service items belong to service/item photos only, and painting
/// dimensions are present exactly when the item is a painting task.
pub fn check_service_payload(
    photo_type: Classification,
    service_item: Option<&str>,
    dimensions: Option<&PaintingDimensions>,
) -> Result<()> {
    if service_item.is_some() && photo_type != Classification::ServicosItens {
        return Err(SurveyError::validation(format!(
            "service item is only allowed for {} photos",
            Classification::ServicosItens
        )));
    }

    let painting = photo_type == Classification::ServicosItens
        && service_item.map(catalog::is_painting).unwrap_or(false);

    match (painting, dimensions) {
        (true, None) => Err(SurveyError::validation(
            "painting dimensions are required for painting items",
        )),
        (false, Some(_)) => Err(SurveyError::validation(
            "painting dimensions are only allowed for painting items",
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(photo_type: Classification) -> NewPhoto {
        NewPhoto {
            environment_id: 1,
            image_url: "http://files/1.jpg".to_string(),
            observation: None,
            photo_type,
            service_item: None,
            painting_dimensions: None,
        }
    }

    #[test]
    fn test_comma_decimal_area() {
        let dims = PaintingDimensions::confirm("3,5", "2,8");
        assert_eq!(dims.area, "9,80");
        assert_eq!(dims.width, "3,5");
        assert_eq!(dims.area_value(), Some(9.8));
    }

    #[test]
    fn test_integer_area() {
        let dims = PaintingDimensions::confirm("2", "3");
        assert_eq!(
            dims,
            PaintingDimensions {
                width: "2".to_string(),
                height: "3".to_string(),
                area: "6,00".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_inputs_yield_zero_area() {
        assert_eq!(PaintingDimensions::confirm("", "3").area, "0");
        assert_eq!(PaintingDimensions::confirm("abc", "3").area, "0");
        assert_eq!(PaintingDimensions::confirm("2", "  ").area, "0");
    }

    #[test]
    fn test_area_rounding() {
        assert_eq!(compute_area(1.005, 1.0), Some(1.0));
        assert_eq!(compute_area(1.234, 2.0), Some(2.47));
        assert_eq!(compute_area(f64::MAX, 10.0), None);
        assert_eq!(parse_decimal("inf"), None);
        assert_eq!(parse_decimal(" 4.25 "), Some(4.25));
    }

    #[test]
    fn test_parse_decimal_reads_leading_number() {
        assert_eq!(parse_decimal("3,5m"), Some(3.5));
        assert_eq!(parse_decimal("2 m"), Some(2.0));
        assert_eq!(parse_decimal(".5"), Some(0.5));
        assert_eq!(parse_decimal("7."), Some(7.0));
        assert_eq!(parse_decimal("-1,25"), Some(-1.25));
        assert_eq!(parse_decimal("1e2x"), Some(100.0));
        assert_eq!(parse_decimal("4e"), Some(4.0));
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal("."), None);
        assert_eq!(parse_decimal("-"), None);
        assert_eq!(parse_decimal("m3"), None);

        assert_eq!(PaintingDimensions::confirm("3,5m", "2").area, "7,00");
    }

    #[test]
    fn test_classification_serialization() {
        let json = serde_json::to_string(&Classification::VistaAmpla).unwrap();
        assert_eq!(json, "\"vista_ampla\"");
        let parsed: Classification = serde_json::from_str("\"servicos_itens\"").unwrap();
        assert_eq!(parsed, Classification::ServicosItens);
        assert_eq!(Classification::Detalhes.to_string(), "detalhes");
    }

    #[test]
    fn test_wide_view_photo_without_dimensions_is_valid() {
        assert!(photo(Classification::VistaAmpla).validate().is_ok());
    }

    #[test]
    fn test_dimension_invariant() {
        let mut painting = photo(Classification::ServicosItens);
        painting.service_item = Some("17.8 - PINTURA DE PISO".to_string());
        assert!(painting.validate().is_err());

        painting.painting_dimensions = Some(PaintingDimensions::confirm("2", "3"));
        assert!(painting.validate().is_ok());

        let mut lamps = photo(Classification::ServicosItens);
        lamps.service_item = Some("19.37 - SUBSTITUIÇÃO DE LÂMPADAS".to_string());
        assert!(lamps.validate().is_ok());
        lamps.painting_dimensions = Some(PaintingDimensions::confirm("2", "3"));
        assert!(lamps.validate().is_err());

        let mut detail = photo(Classification::Detalhes);
        detail.painting_dimensions = Some(PaintingDimensions::confirm("2", "3"));
        assert!(detail.validate().is_err());
    }

    #[test]
    fn test_new_survey_requires_fields() {
        let survey = NewSurvey {
            agency_name: "Agência Centro".to_string(),
            prefix: "1234".to_string(),
            manager_name: " ".to_string(),
            registration: "F0001".to_string(),
        };
        assert!(matches!(
            survey.validate(),
            Err(SurveyError::Validation { .. })
        ));
    }
}
