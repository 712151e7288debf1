use encoding_rs::Encoding;

use super::dom::HtmlPage;

impl HtmlPage {
    /// 序列化为 UTF-8 字符串
    pub fn serialize_html(&self) -> String {
        self.html().html()
    }
}

/// 序列化页面，并按原始字符集重新编码
pub fn serialize_page(page: &HtmlPage, document_encoding: &str) -> Vec<u8> {
    let s = page.serialize_html();

    if !document_encoding.is_empty() {
        if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
            let (data, _, _) = encoding.encode(&s);
            return data.into_owned();
        }
    }

    s.into_bytes()
}
