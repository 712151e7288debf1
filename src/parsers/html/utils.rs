use crate::host::{Overlay, OverlayKind, OVERLAY_CLASS};

/// 转义文本以便放进 HTML
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 生成浮层的 HTML 片段
pub fn overlay_markup(overlay: &Overlay) -> String {
    let flag = match &overlay.flag {
        Some(flag) => format!("<span class=\"flag-emoji\">{}</span>", escape_html(flag)),
        None => String::new(),
    };
    let close = if overlay.closable() {
        "<button class=\"close-translation\" aria-label=\"Close translation\">×</button>"
    } else {
        ""
    };
    let content = match overlay.kind {
        OverlayKind::Loading => {
            "<div class=\"loading-dots\"><span></span><span></span><span></span></div>".to_string()
        }
        _ => escape_html(&overlay.text),
    };

    format!(
        "<div class=\"{} {}\" data-overlay-id=\"{}\" style=\"font-size: {}%\">\
         <div class=\"flag-translation-header\">{}<span class=\"translation-status\">{}</span>{}</div>\
         <div class=\"translation-content\">{}</div></div>",
        OVERLAY_CLASS,
        overlay.kind.class_name(),
        overlay.id,
        overlay.bubble_size,
        flag,
        overlay.kind.status_label(),
        close,
        content,
    )
}
