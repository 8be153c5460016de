//! 文件内容提取工具模块
//!
//! 该模块把用户上传的文件（.txt, .md, .docx, .pdf）转换为纯文本，
//! 并把会话中的全部文档拼接成发送给模型的上下文。
//! 提取结果不做缓存，每一轮对话重新提取。

use serde::Serialize;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};
use xml::name::OwnedName;
use xml::reader::{EventReader, XmlEvent};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::models::{DocumentInfo, DocumentPreview};

/// 预览展示的最大字符数。
pub const PREVIEW_CHARS: usize = 1000;

const WORD_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const DOCX_BODY: &str = "word/document.xml";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("读取文件失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("不是有效的 DOCX 压缩包: {0}")]
    Zip(ZipError),
    #[error("DOCX 缺少 {0}")]
    MissingPart(&'static str),
    #[error("XML 解析失败: {0}")]
    Xml(#[from] xml::reader::Error),
    #[error("PDF解析失败: {0}")]
    Pdf(String),
}

/// 根据扩展名识别的文档类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// `.txt` 或 `.md`
    Text,
    Docx,
    Pdf,
    /// 其他扩展名，提取结果为空字符串。
    Unsupported,
}

impl DocumentKind {
    /// 扩展名匹配不区分大小写。
    pub fn from_name(name: &str) -> Self {
        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "txt" | "md" => DocumentKind::Text,
            "docx" => DocumentKind::Docx,
            "pdf" => DocumentKind::Pdf,
            _ => DocumentKind::Unsupported,
        }
    }
}

/// 按文件名选择提取方式，把文件字节转换为纯文本。
///
/// 支持的格式：
/// - `.txt`, `.md`: 按 UTF-8 解码，非法字节替换为 U+FFFD。
/// - `.docx`: 每个段落一行。
/// - `.pdf`: 逐页提取后按页序拼接，没有文字的页视为空字符串。
/// - 其他: 返回空字符串。
pub fn extract_text(name: &str, bytes: &[u8]) -> Result<String, ExtractError> {
    match DocumentKind::from_name(name) {
        DocumentKind::Text => Ok(decode_text(bytes)),
        DocumentKind::Docx => read_docx(bytes),
        DocumentKind::Pdf => read_pdf(bytes),
        DocumentKind::Unsupported => {
            debug!(name, "unsupported extension, skipping");
            Ok(String::new())
        }
    }
}

fn decode_text(bytes: &[u8]) -> String {
    let (text, _, had_errors) = encoding_rs::UTF_8.decode(bytes);
    if had_errors {
        debug!("invalid utf-8 sequences replaced");
    }
    text.into_owned()
}

/// 读取 DOCX：DOCX 本质上是 ZIP 压缩包，正文位于 `word/document.xml`。
fn read_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(ExtractError::Zip)?;
    let mut part = archive.by_name(DOCX_BODY).map_err(|e| match e {
        ZipError::FileNotFound => ExtractError::MissingPart(DOCX_BODY),
        other => ExtractError::Zip(other),
    })?;

    let mut xml = String::new();
    part.read_to_string(&mut xml)?;
    paragraphs_from_xml(&xml)
}

fn is_word(name: &OwnedName, local: &str) -> bool {
    name.local_name == local && name.namespace.as_deref() == Some(WORD_NS)
}

/// 从 WordprocessingML 中取出段落文本，段落之间以换行分隔。
///
/// 文字位于 `<w:p>` 内的 `<w:t>`；run 内的 `<w:tab/>` 与 `<w:br/>`
/// 分别还原为制表符和换行。
pub fn paragraphs_from_xml(xml: &str) -> Result<String, ExtractError> {
    let reader = EventReader::new(xml.as_bytes());
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    // 文本框里的段落会嵌套在外层段落中，只在最外层段落结束时收尾
    let mut paragraph_depth = 0usize;
    let mut in_run = false;
    let mut in_text = false;

    for event in reader {
        match event? {
            XmlEvent::StartElement { name, .. } => {
                if is_word(&name, "p") {
                    paragraph_depth += 1;
                } else if is_word(&name, "r") {
                    in_run = true;
                } else if is_word(&name, "t") {
                    in_text = true;
                } else if in_run && is_word(&name, "tab") {
                    current.push('\t');
                } else if in_run && (is_word(&name, "br") || is_word(&name, "cr")) {
                    current.push('\n');
                }
            }
            XmlEvent::Characters(content) | XmlEvent::Whitespace(content) if in_text => {
                current.push_str(&content);
            }
            XmlEvent::EndElement { name } => {
                if is_word(&name, "t") {
                    in_text = false;
                } else if is_word(&name, "r") {
                    in_run = false;
                } else if is_word(&name, "p") && paragraph_depth > 0 {
                    paragraph_depth -= 1;
                    if paragraph_depth == 0 {
                        paragraphs.push(std::mem::take(&mut current));
                    }
                }
            }
            _ => {}
        }
    }
    Ok(paragraphs.join("\n"))
}

/// 读取 PDF。
///
/// 先用 `pdf_extract` 整体提取；它在个别字体或页面上会报错甚至 panic，
/// 这时退回到 `lopdf` 逐页提取，单页失败按空字符串处理。
fn read_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => return Ok(text),
        Ok(Err(e)) => warn!("pdf_extract failed, falling back to per-page extraction: {:?}", e),
        Err(_) => warn!("pdf_extract panicked, falling back to per-page extraction"),
    }
    read_pdf_by_pages(bytes)
}

fn read_pdf_by_pages(bytes: &[u8]) -> Result<String, ExtractError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let mut full_text = String::new();

    // get_pages 返回 BTreeMap，键即页码，迭代顺序就是页序
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => full_text.push_str(&text),
            Err(e) => debug!(page = page_number, "page has no extractable text: {}", e),
        }
    }
    Ok(full_text)
}

/// 用户上传的一个文件：文件名加原始字节。
#[derive(Clone, Debug, PartialEq)]
pub struct UploadedDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedDocument {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// 从磁盘读取，文件名取路径的最后一段。
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ExtractError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }

    pub fn kind(&self) -> DocumentKind {
        DocumentKind::from_name(&self.name)
    }

    pub fn extract(&self) -> Result<String, ExtractError> {
        extract_text(&self.name, &self.bytes)
    }

    pub fn info(&self) -> DocumentInfo {
        DocumentInfo {
            name: self.name.clone(),
            size: self.bytes.len(),
        }
    }
}

/// 单个文件的提取失败，消息中带有文件名，可直接展示给用户。
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ExtractionFailure {
    pub name: String,
    pub message: String,
}

/// 一轮对话使用的文档上下文。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentContext {
    /// 拼接后的上下文文本，每个文档以 `### 文件名:` 开头。
    pub text: String,
    pub previews: Vec<DocumentPreview>,
    pub failures: Vec<ExtractionFailure>,
}

/// 依次提取所有文档并拼接上下文。
///
/// 某个文件提取失败只记录该文件的错误，其余文件照常处理。
pub fn build_context(documents: &[UploadedDocument]) -> DocumentContext {
    let mut context = DocumentContext::default();

    for doc in documents {
        match doc.extract() {
            Ok(content) => {
                context.text.push_str(&format!("\n\n### {}:\n{}", doc.name, content));
                context.previews.push(DocumentPreview {
                    name: doc.name.clone(),
                    preview: Some(content.chars().take(PREVIEW_CHARS).collect()),
                    error: None,
                });
            }
            Err(e) => {
                let message = format!("读取 {} 失败: {}", doc.name, e);
                warn!("{}", message);
                context.previews.push(DocumentPreview {
                    name: doc.name.clone(),
                    preview: None,
                    error: Some(message.clone()),
                });
                context.failures.push(ExtractionFailure {
                    name: doc.name.clone(),
                    message,
                });
            }
        }
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// 每一页一组内容流操作，空数组表示空白页。
    fn pdf_from_operations(pages: Vec<Vec<Operation>>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for operations in pages {
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn text_page(text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]
    }

    #[test]
    fn page_fallback_skips_blank_and_broken_pages() {
        // 第三页的 Tf 缺少字体名，Tj 的操作数也不是字符串
        let broken = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![24.into()]),
            Operation::new("Tj", vec![42.into()]),
            Operation::new("ET", vec![]),
        ];
        let bytes = pdf_from_operations(vec![text_page("Alpha"), vec![], broken, text_page("Gamma")]);

        let text = read_pdf_by_pages(&bytes).unwrap();

        assert_eq!(text.split_whitespace().collect::<Vec<_>>(), ["Alpha", "Gamma"]);
    }

    #[test]
    fn page_fallback_rejects_non_pdf_bytes() {
        assert!(matches!(
            read_pdf_by_pages(b"%PDF-1.5 truncated"),
            Err(ExtractError::Pdf(_))
        ));
    }

    #[test]
    fn kind_is_case_insensitive() {
        assert_eq!(DocumentKind::from_name("notes.MD"), DocumentKind::Text);
        assert_eq!(DocumentKind::from_name("a.b.Docx"), DocumentKind::Docx);
        assert_eq!(DocumentKind::from_name("scan.pdf"), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_name("image.png"), DocumentKind::Unsupported);
        assert_eq!(DocumentKind::from_name("README"), DocumentKind::Unsupported);
    }

    #[test]
    fn text_decoding_replaces_invalid_bytes() {
        let text = extract_text("a.txt", b"caf\xC3\xA9 \xFF ok").unwrap();
        assert_eq!(text, "café \u{FFFD} ok");
    }

    #[test]
    fn unsupported_extension_yields_empty_string() {
        assert_eq!(extract_text("photo.jpg", b"\x89PNG").unwrap(), "");
    }

    #[test]
    fn paragraphs_become_lines() {
        let xml = format!(
            r#"<w:document xmlns:w="{}"><w:body>
                <w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr>
                    <w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p>
                <w:p/>
                <w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p>
            </w:body></w:document>"#,
            WORD_NS
        );
        assert_eq!(paragraphs_from_xml(&xml).unwrap(), "Hello world\n\na\tb\nc");
    }

    #[test]
    fn broken_docx_is_an_error() {
        assert!(matches!(
            extract_text("broken.docx", b"not a zip"),
            Err(ExtractError::Zip(_))
        ));
    }

    #[test]
    fn failures_do_not_stop_other_documents() {
        let docs = vec![
            UploadedDocument::new("first.txt", "alpha"),
            UploadedDocument::new("broken.docx", "nope"),
            UploadedDocument::new("second.md", "# beta"),
        ];
        let context = build_context(&docs);

        assert_eq!(context.text, "\n\n### first.txt:\nalpha\n\n### second.md:\n# beta");
        assert_eq!(context.failures.len(), 1);
        assert_eq!(context.failures[0].name, "broken.docx");
        assert!(context.failures[0].message.contains("broken.docx"));
        assert_eq!(context.previews.len(), 3);
        assert!(context.previews[1].error.is_some());
    }

    #[test]
    fn preview_is_truncated() {
        let long = "x".repeat(PREVIEW_CHARS + 50);
        let context = build_context(&[UploadedDocument::new("long.txt", long)]);
        assert_eq!(
            context.previews[0].preview.as_ref().map(|p| p.chars().count()),
            Some(PREVIEW_CHARS)
        );
    }
}
