//! CV text extraction from uploaded PDFs.

use bytes::Bytes;
use tracing::debug;

use crate::errors::AppError;

/// Extracts the text of every page, in order. Parsing runs on a blocking thread.
pub async fn extract_pdf_text(pdf: Bytes) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || extract_text(&pdf))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("PDF extraction task failed: {e}")))?
}

fn extract_text(pdf: &[u8]) -> Result<String, AppError> {
    if !pdf.starts_with(b"%PDF") {
        return Err(AppError::UnprocessableEntity(
            "Uploaded file is not a PDF".to_string(),
        ));
    }

    // pdf-extract panics on some malformed documents instead of returning an error.
    let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(pdf))
        .map_err(|_| AppError::UnprocessableEntity("Could not read PDF".to_string()))?
        .map_err(|e| AppError::UnprocessableEntity(format!("Could not read PDF: {e}")))?;

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::UnprocessableEntity(
            "PDF contains no extractable text (scanned documents are not supported)".to_string(),
        ));
    }

    debug!("Extracted {} chars of CV text", text.len());
    Ok(text)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A small valid PDF with one Helvetica text line per page; `""` gives a page with no text.
    pub(crate) fn sample_pdf(pages: &[&str]) -> Vec<u8> {
        let page_ids: Vec<usize> = (0..pages.len()).map(|i| 4 + 2 * i).collect();
        let kids: Vec<String> = page_ids.iter().map(|id| format!("{id} 0 R")).collect();

        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                pages.len()
            ),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
        ];
        for (text, page_id) in pages.iter().zip(&page_ids) {
            let content = if text.is_empty() {
                String::new()
            } else {
                format!("BT /F1 24 Tf 72 700 Td ({text}) Tj ET")
            };
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                page_id + 1
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{content}\nendstream",
                content.len()
            ));
        }

        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (idx, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", idx + 1).as_bytes());
        }

        let xref_at = out.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            xref.push_str(&format!("{offset:010} 00000 n \n"));
        }
        xref.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
            objects.len() + 1
        ));
        out.extend_from_slice(xref.as_bytes());
        out
    }

    #[test]
    fn test_extracts_every_page_in_order() {
        let text = extract_text(&sample_pdf(&["Alpha", "Omega"])).unwrap();
        let alpha = text.find("Alpha").expect("first page text");
        let omega = text.find("Omega").expect("second page text");
        assert!(alpha < omega);
    }

    #[test]
    fn test_pdf_without_text_is_unprocessable() {
        let err = extract_text(&sample_pdf(&[""])).unwrap_err();
        assert!(matches!(err, AppError::UnprocessableEntity(_)));
    }

    #[test]
    fn test_rejects_non_pdf_bytes() {
        let err = extract_text(b"PK\x03\x04 this is a zip").unwrap_err();
        assert!(matches!(err, AppError::UnprocessableEntity(_)));
    }

    #[test]
    fn test_rejects_truncated_pdf() {
        let err = extract_text(b"%PDF-1.7\n%%garbage").unwrap_err();
        assert!(matches!(err, AppError::UnprocessableEntity(_)));
    }

    #[tokio::test]
    async fn test_async_wrapper_propagates_errors() {
        let result = extract_pdf_text(Bytes::from_static(b"not a pdf")).await;
        assert!(matches!(result, Err(AppError::UnprocessableEntity(_))));
    }
}
