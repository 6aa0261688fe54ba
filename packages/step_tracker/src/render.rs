use std::fmt::Debug;

use crate::{Error, Report, Result};

/// Turns a [`Report`] into its presentation format.
///
/// Renderers never modify the report. Implement this trait to produce formats not offered
/// by this package, such as HTML or Markdown.
///
/// # Examples
///
/// ```
/// use step_tracker::{Error, Renderer, Report, Session};
///
/// /// One line per step with nothing but its name and duration.
/// #[derive(Debug)]
/// struct CompactRenderer;
///
/// impl Renderer for CompactRenderer {
///     fn render(&self, report: &Report) -> Result<Vec<u8>, Error> {
///         let mut output = String::new();
///
///         for row in report.rows() {
///             output.push_str(&format!("{}={}\n", row.name(), row.duration()));
///         }
///
///         Ok(output.into_bytes())
///     }
/// }
///
/// # fn main() -> Result<(), Error> {
/// let session = Session::new();
/// session.bracket("parse", || ())?;
///
/// let bytes = CompactRenderer.render(&session.to_report()?)?;
/// assert_eq!(bytes, b"parse=0.00 s\n");
/// # Ok(())
/// # }
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait Renderer: Debug + Send + Sync + 'static {
    /// Renders the report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Render`] if the report cannot be rendered.
    fn render(&self, report: &Report) -> Result<Vec<u8>>;
}

/// Renders a report as the plain text table of its `Display` implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextRenderer;

impl Renderer for TextRenderer {
    fn render(&self, report: &Report) -> Result<Vec<u8>> {
        Ok(report.to_string().into_bytes())
    }
}

/// Renders a report as a JSON document.
///
/// Every report field is included: metadata, summary statistics and all rows, each value
/// both raw (seconds, bytes) and formatted for display.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonRenderer {
    pretty: bool,
}

impl JsonRenderer {
    /// Renders the document on a single line.
    #[must_use]
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    /// Renders the document indented over multiple lines.
    #[must_use]
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Renderer for JsonRenderer {
    fn render(&self, report: &Report) -> Result<Vec<u8>> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(report)
        } else {
            serde_json::to_vec(report)
        };

        bytes.map_err(|e| Error::Render {
            source: Box::new(e),
        })
    }
}
