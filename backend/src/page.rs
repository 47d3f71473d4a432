//! Server-rendered HTML for the single-page form.
//!
//! Styling lives in `static/style.css`; this module only emits markup and
//! the class names that stylesheet targets (`result-box-neg`,
//! `result-box-pos`, `error-banner`).

use std::fmt::Write;

use crate::models::{
    Outcome, PredictionRequest, PredictionResult, AGE_MAX, AGE_MIN, BMI_MAX, BMI_MIN,
    GLUCOSE_MAX, GLUCOSE_MIN, INSULIN_MAX, INSULIN_MIN,
};

/// Everything one render of the page depends on.
#[derive(Debug, Default)]
pub struct PageView<'a> {
    /// Values to prefill the inputs with.
    pub request: PredictionRequest,
    pub result: Option<&'a PredictionResult>,
    /// Inline message for rejected input.
    pub input_error: Option<&'a str>,
    /// Blocking banner shown when no model could be loaded.
    pub model_error: Option<&'a str>,
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render(view: &PageView<'_>) -> String {
    let mut html = String::with_capacity(4096);
    html.push_str(concat!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n",
        "<meta charset=\"utf-8\">\n",
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n",
        "<title>Diabetes Risk Predictor</title>\n",
        "<link rel=\"stylesheet\" href=\"/static/style.css\">\n",
        "</head>\n<body>\n<div class=\"layout\">\n",
    ));
    html.push_str(SIDEBAR);
    html.push_str("<main>\n<h1 class=\"main-header\">\u{1FA7A} Diabetes Prediction AI</h1>\n");
    html.push_str("<p>Enter the patient's details below to generate a prediction.</p>\n");

    if let Some(message) = view.model_error {
        let _ = write!(
            html,
            "<div class=\"error-banner\"><strong>Model unavailable.</strong> {}<br>\
             Provide a valid model file and restart the service.</div>\n",
            escape_html(message)
        );
    }

    render_form(&mut html, &view.request, view.model_error.is_none());

    if let Some(message) = view.input_error {
        let _ = write!(
            html,
            "<div class=\"input-error\">{}</div>\n",
            escape_html(message)
        );
    }

    if let Some(result) = view.result {
        render_result(&mut html, result);
    }

    html.push_str("</main>\n</div>\n</body>\n</html>\n");
    html
}

const SIDEBAR: &str = "<aside class=\"sidebar\">\n\
<h2>About</h2>\n\
<p class=\"info\">This application uses a <strong>Logistic Regression</strong> machine learning model \
to predict the likelihood of diabetes based on diagnostic measures.</p>\n\
<hr>\n\
<p><strong>Model Inputs:</strong></p>\n\
<ul><li>Age</li><li>BMI (Mass)</li><li>Insulin Level</li><li>Plasma Glucose</li></ul>\n\
</aside>\n";

fn render_form(html: &mut String, request: &PredictionRequest, enabled: bool) {
    html.push_str("<form class=\"card\" method=\"post\" action=\"/analyze\">\n");
    html.push_str("<h3>Patient Information</h3>\n<div class=\"columns\">\n<div class=\"column\">\n");
    number_input(html, "age", "Age (years)", request.age.to_string(), AGE_MIN, AGE_MAX, "1");
    number_input(
        html,
        "body_mass_index",
        "Body Mass Index (BMI)",
        format!("{:.1}", request.body_mass_index),
        format!("{:.1}", BMI_MIN),
        format!("{:.1}", BMI_MAX),
        "0.1",
    );
    html.push_str("</div>\n<div class=\"column\">\n");
    number_input(
        html,
        "insulin_level",
        "Insulin Level (mu U/ml)",
        request.insulin_level.to_string(),
        INSULIN_MIN,
        INSULIN_MAX,
        "1",
    );
    number_input(
        html,
        "plasma_glucose",
        "Plasma Glucose",
        request.plasma_glucose.to_string(),
        GLUCOSE_MIN,
        GLUCOSE_MAX,
        "1",
    );
    html.push_str("</div>\n</div>\n");
    let disabled = if enabled { "" } else { " disabled" };
    let _ = write!(
        html,
        "<button type=\"submit\" class=\"analyze\"{}>Analyze Risk</button>\n</form>\n",
        disabled
    );
}

fn number_input(
    html: &mut String,
    name: &str,
    label: &str,
    value: String,
    min: impl std::fmt::Display,
    max: impl std::fmt::Display,
    step: &str,
) {
    let _ = write!(
        html,
        "<label for=\"{name}\">{label}</label>\n\
         <input type=\"number\" id=\"{name}\" name=\"{name}\" value=\"{value}\" \
         min=\"{min}\" max=\"{max}\" step=\"{step}\" required>\n"
    );
}

fn render_result(html: &mut String, result: &PredictionResult) {
    let (class, icon) = match result.outcome {
        Outcome::Negative => ("result-box-neg", "\u{2705}"),
        Outcome::Positive => ("result-box-pos", "\u{26A0}\u{FE0F}"),
    };
    html.push_str("<hr>\n<h2>Prediction Result:</h2>\n");
    let _ = write!(
        html,
        "<div class=\"{}\">{} Result: {}<br>\n<span class=\"detail\">{}</span>\n</div>\n",
        class,
        icon,
        escape_html(&result.headline),
        escape_html(&result.message)
    );
}
