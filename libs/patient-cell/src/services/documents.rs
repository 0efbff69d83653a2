use std::mem;

use chrono::NaiveDate;
use serde::Serialize;

use crate::services::records::format_cpf;

pub const SIGNATURE_RULE: &str = "____________________________________";

// ==============================================================================
// FONT METRICS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FontFace {
    Regular,
    Bold,
}

/// Measures rendered text. The document renderer supplies the real font
/// tables; layout only needs widths.
pub trait FontMetrics: Send + Sync {
    fn text_width(&self, text: &str, font: FontFace, size: f32) -> f32;
}

/// Every character takes a fixed fraction of the font size.
#[derive(Debug, Clone, Copy)]
pub struct AverageWidthMetrics {
    pub regular_em: f32,
    pub bold_em: f32,
}

impl Default for AverageWidthMetrics {
    /// Close to Helvetica's average advance.
    fn default() -> Self {
        Self {
            regular_em: 0.5,
            bold_em: 0.55,
        }
    }
}

impl FontMetrics for AverageWidthMetrics {
    fn text_width(&self, text: &str, font: FontFace, size: f32) -> f32 {
        let em = match font {
            FontFace::Regular => self.regular_em,
            FontFace::Bold => self.bold_em,
        };
        text.chars().count() as f32 * em * size
    }
}

// ==============================================================================
// PAGE LAYOUT
// ==============================================================================

/// Page geometry in points, origin at the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub width: f32,
    pub height: f32,
    pub margin_x: f32,
    pub top_y: f32,
    pub bottom_y: f32,
    pub font_size: f32,
    pub line_height: f32,
}

impl PageLayout {
    pub fn max_width(&self) -> f32 {
        self.width - self.margin_x * 2.0
    }
}

impl Default for PageLayout {
    /// A4 portrait.
    fn default() -> Self {
        Self {
            width: 595.0,
            height: 842.0,
            margin_x: 50.0,
            top_y: 790.0,
            bottom_y: 70.0,
            font_size: 12.0,
            line_height: 16.0,
        }
    }
}

/// One line of text for the document renderer to draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPlacement {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub max_width: f32,
    pub font: FontFace,
    pub size: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentPage {
    pub placements: Vec<TextPlacement>,
}

/// Greedy word wrap. A single word wider than `max_width` gets a line of its own.
pub fn wrap_words(text: &str, font: FontFace, size: f32, max_width: f32, metrics: &dyn FontMetrics) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };

        if metrics.text_width(&candidate, font, size) <= max_width {
            current = candidate;
        } else {
            if !current.is_empty() {
                lines.push(mem::take(&mut current));
            }
            current = word.to_string();
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Top-down cursor that starts a new page once it drops below the bottom margin.
pub struct PageComposer<'a> {
    layout: PageLayout,
    metrics: &'a dyn FontMetrics,
    done: Vec<DocumentPage>,
    current: DocumentPage,
    y: f32,
}

impl<'a> PageComposer<'a> {
    pub fn new(layout: PageLayout, metrics: &'a dyn FontMetrics) -> Self {
        Self {
            y: layout.top_y,
            layout,
            metrics,
            done: Vec::new(),
            current: DocumentPage::default(),
        }
    }

    fn line(&mut self, text: String, font: FontFace, size: f32) {
        if self.y < self.layout.bottom_y {
            self.done.push(mem::take(&mut self.current));
            self.y = self.layout.top_y;
        }

        self.current.placements.push(TextPlacement {
            text,
            x: self.layout.margin_x,
            y: self.y,
            max_width: self.layout.max_width(),
            font,
            size,
        });
        self.y -= self.layout.line_height;
    }

    /// Wrapped paragraph. Blank text still takes one line of space.
    pub fn paragraph(&mut self, text: &str, font: FontFace, size: f32) {
        let lines = wrap_words(text, font, size, self.layout.max_width(), self.metrics);
        if lines.is_empty() {
            self.skip(self.layout.line_height);
            return;
        }
        for line in lines {
            self.line(line, font, size);
        }
    }

    pub fn skip(&mut self, points: f32) {
        self.y -= points;
    }

    pub fn finish(mut self) -> Vec<DocumentPage> {
        self.done.push(self.current);
        self.done
    }
}

// ==============================================================================
// ATTESTATIONS
// ==============================================================================

/// dd/mm/yyyy.
pub fn br_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// What an attestation sheet prints about the visit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttestationSheet {
    pub patient_name: String,
    pub patient_cpf: String,
    pub professional_name: String,
    pub professional_crp: String,
    pub doc_date: Option<NaiveDate>,
    pub days_off: Option<u32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value.trim()
    }
}

impl AttestationSheet {
    /// The standard attestation wording. A full leave period wins over a day count.
    pub fn default_text(&self) -> String {
        let patient = match self.patient_name.trim() {
            "" => "[PACIENTE]",
            name => name,
        };
        let date = self.doc_date.map(br_date).unwrap_or_else(|| "[DATA]".to_string());

        let period = match (self.start_date, self.end_date, self.days_off) {
            (Some(start), Some(end), _) => format!(", no período de {} até {}", br_date(start), br_date(end)),
            (_, _, Some(days)) => format!(", por {} dia(s)", days),
            _ => String::new(),
        };

        let professional = match self.professional_name.trim() {
            "" => String::new(),
            name => format!("Profissional: {}", name),
        };

        format!(
            "ATESTADO\n\nAtesto para os devidos fins que {} esteve em atendimento nesta clínica na data de {}{}.\n\n{}\n\n{}\nAssinatura e carimbo",
            patient, date, period, professional, SIGNATURE_RULE
        )
    }

    /// `atestado_<name>_<yyyy-mm-dd>.pdf`, whitespace in the name replaced by `_`.
    pub fn file_name(&self) -> String {
        let name = match self.patient_name.trim() {
            "" => "paciente".to_string(),
            name => name.split_whitespace().collect::<Vec<_>>().join("_"),
        };
        let date = self.doc_date.map(|d| d.to_string()).unwrap_or_default();
        format!("atestado_{}_{}.pdf", name, date)
    }

    /// Header block, then `body` one paragraph per line.
    pub fn layout(&self, body: &str, layout: PageLayout, metrics: &dyn FontMetrics) -> Vec<DocumentPage> {
        let size = layout.font_size;
        let mut composer = PageComposer::new(layout, metrics);

        composer.paragraph("ATESTADO", FontFace::Bold, 16.0);
        composer.skip(6.0);

        let cpf = format_cpf(&self.patient_cpf);
        let date = self.doc_date.map(br_date).unwrap_or_default();
        let days = self.days_off.map(|d| d.to_string()).unwrap_or_default();

        composer.paragraph(&format!("Paciente: {}", or_dash(&self.patient_name)), FontFace::Bold, size);
        composer.paragraph(&format!("CPF: {}", or_dash(&cpf)), FontFace::Regular, size);
        composer.paragraph(&format!("Profissional: {}", or_dash(&self.professional_name)), FontFace::Bold, size);
        composer.paragraph(&format!("CRP: {}", or_dash(&self.professional_crp)), FontFace::Regular, size);
        composer.paragraph(&format!("Data: {}", or_dash(&date)), FontFace::Regular, size);
        composer.paragraph(&format!("Dias: {}", or_dash(&days)), FontFace::Regular, size);

        // Separator rule is drawn by the renderer in this gap.
        composer.skip(28.0);

        for line in body.replace('\r', "").split('\n') {
            composer.paragraph(line.trim(), FontFace::Regular, size);
        }

        composer.finish()
    }
}

/// Everything a renderer needs to produce the attestation file.
#[derive(Debug, Clone, Serialize)]
pub struct AttestationDocument {
    pub file_name: String,
    pub body: String,
    pub pages: Vec<DocumentPage>,
}

impl AttestationDocument {
    /// Stored content wins; blank content falls back to the standard wording.
    pub fn compose(sheet: &AttestationSheet, content: &str, layout: PageLayout, metrics: &dyn FontMetrics) -> Self {
        let body = match content.trim() {
            "" => sheet.default_text(),
            _ => content.to_string(),
        };
        let pages = sheet.layout(&body, layout, metrics);

        Self {
            file_name: sheet.file_name(),
            body,
            pages,
        }
    }
}
