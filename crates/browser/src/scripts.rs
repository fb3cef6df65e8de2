//! JavaScript injected into the page
//!
//! Every script is read-only except the click and fill helpers, and every
//! script returns a string: snapshots return JSON, helpers return a status word.

use serde::Deserialize;

/// Visibility check shared by all scripts
const VISIBLE_FN: &str = r#"
  function isVisible(el) {
    if (!el) return false;
    const s = window.getComputedStyle(el);
    return s.display !== 'none' && s.visibility !== 'hidden' && s.opacity !== '0'
      && el.offsetWidth > 0 && el.offsetHeight > 0;
  }
  function labelOf(el) {
    let t = (el.innerText || el.textContent || el.value || '').trim();
    if (!t) t = (el.getAttribute('aria-label') || el.getAttribute('title') || '').trim();
    return t.replace(/\s+/g, ' ');
  }
"#;

const QUICK_BODY: &str = r#"
  const links = Array.from(document.querySelectorAll('a[href]')).slice(0, 100)
    .filter(a => isVisible(a) && labelOf(a))
    .map(a => ({ text: labelOf(a).slice(0, 80), href: a.href }));
  const buttons = Array.from(document.querySelectorAll(
      'button, [role="button"], input[type="submit"], input[type="button"]'))
    .slice(0, 150)
    .filter(b => isVisible(b) && !b.disabled && labelOf(b))
    .map(b => labelOf(b).slice(0, 80));
  return JSON.stringify({
    url: window.location.href, title: document.title, links, buttons
  });
"#;

const FULL_BODY: &str = r#"
  const text = (document.body ? document.body.innerText : '').slice(0, 20000);
  const links = Array.from(document.querySelectorAll('a[href]')).slice(0, 200)
    .filter(a => isVisible(a) && labelOf(a))
    .map(a => ({ text: labelOf(a).slice(0, 80), href: a.href }));
  const buttons = Array.from(document.querySelectorAll(
      'button, [role="button"], input[type="submit"], input[type="button"]'))
    .slice(0, 150)
    .filter(b => isVisible(b) && !b.disabled && labelOf(b))
    .map(b => ({
      text: labelOf(b).slice(0, 80),
      type: b.getAttribute('type') || '',
      role: b.getAttribute('role') || ''
    }));
  const inputs = Array.from(document.querySelectorAll('input, textarea, select'))
    .filter(i => isVisible(i) && i.type !== 'hidden')
    .slice(0, 50)
    .map(i => {
      let label = '';
      if (i.id) {
        const l = document.querySelector('label[for="' + CSS.escape(i.id) + '"]');
        if (l) label = labelOf(l);
      }
      if (!label && i.closest('label')) label = labelOf(i.closest('label'));
      return {
        type: i.type || i.tagName.toLowerCase(),
        placeholder: i.placeholder || '',
        name: i.name || '',
        id: i.id || '',
        label: label || i.getAttribute('aria-label') || ''
      };
    });
  const headings = Array.from(document.querySelectorAll('h1, h2, h3, h4, h5, h6'))
    .filter(h => isVisible(h) && labelOf(h))
    .slice(0, 30)
    .map(h => ({ level: h.tagName.toLowerCase(), text: labelOf(h).slice(0, 120) }));
  const lists = Array.from(document.querySelectorAll('ul, ol'))
    .filter(isVisible)
    .map(l => Array.from(l.querySelectorAll(':scope > li')).map(labelOf).filter(Boolean).slice(0, 20))
    .filter(items => items.length > 0)
    .slice(0, 10);
  const tables = Array.from(document.querySelectorAll('table'))
    .filter(isVisible)
    .slice(0, 5)
    .map(t => Array.from(t.rows).slice(0, 20)
      .map(r => Array.from(r.cells).map(c => labelOf(c).slice(0, 60))));
  return JSON.stringify({
    url: window.location.href, title: document.title,
    text, links, buttons, inputs, headings, lists, tables
  });
"#;

const CLICK_BODY: &str = r#"
  const wanted = needle.toLowerCase().trim();
  const candidates = Array.from(document.querySelectorAll(
      'a, button, input[type="submit"], input[type="button"], [role="button"], [role="link"],'
      + ' [role="tab"], [role="menuitem"], [onclick], label, summary, [tabindex]'));
  let exact = null, partial = null, hidden = false;
  for (const el of candidates) {
    const text = labelOf(el).toLowerCase();
    if (!text) continue;
    const matches = text === wanted ? 'exact' : (text.includes(wanted) ? 'partial' : null);
    if (!matches) continue;
    if (!isVisible(el) || el.disabled) { hidden = true; continue; }
    if (matches === 'exact') { exact = el; break; }
    if (!partial || text.length < labelOf(partial).length) partial = el;
  }
  const target = exact || partial;
  if (!target) return hidden ? 'hidden' : 'not_found';
  target.scrollIntoView({ block: 'center' });
  target.click();
  return 'done';
"#;

const FILL_BODY: &str = r#"
  const wanted = needle.toLowerCase().trim();
  function describe(el) {
    const parts = [el.placeholder, el.getAttribute('aria-label'), el.name, el.id];
    if (el.id) {
      const l = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
      if (l) parts.push(labelOf(l));
    }
    if (el.closest('label')) parts.push(labelOf(el.closest('label')));
    return parts.filter(Boolean).join(' ').toLowerCase();
  }
  const fields = Array.from(document.querySelectorAll(
      'input:not([type="hidden"]), textarea, [contenteditable="true"]'));
  let hidden = false;
  for (const el of fields) {
    if (!describe(el).includes(wanted)) continue;
    if (!isVisible(el) || el.disabled || el.readOnly) { hidden = true; continue; }
    el.scrollIntoView({ block: 'center' });
    el.focus();
    if (el.isContentEditable) {
      el.textContent = value;
    } else {
      const proto = el.tagName === 'TEXTAREA' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
      Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, value);
    }
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    return 'done';
  }
  return hidden ? 'hidden' : 'not_found';
"#;

pub const CURRENT_URL: &str = "window.location.href";

/// Outcome reported by the click and fill helpers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupOutcome {
    Done,
    Hidden,
    NotFound,
}

impl LookupOutcome {
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(raw.trim().to_string())).ok()
    }
}

fn wrap(prelude: &str, body: &str) -> String {
    format!("(() => {{\n{}{}{}}})()", VISIBLE_FN, prelude, body)
}

/// JS string literal for `value`
fn literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

pub fn quick_snapshot() -> String {
    wrap("", QUICK_BODY)
}

pub fn full_snapshot() -> String {
    wrap("", FULL_BODY)
}

pub fn click_by_text(text: &str) -> String {
    wrap(&format!("  const needle = {};\n", literal(text)), CLICK_BODY)
}

pub fn fill_by_placeholder(label: &str, value: &str) -> String {
    wrap(
        &format!(
            "  const needle = {};\n  const value = {};\n",
            literal(label),
            literal(value)
        ),
        FILL_BODY,
    )
}

/// Clears the field matched by `selector` before typing
pub fn clear_field(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); if (el) {{ el.value = ''; }} return 'done'; }})()",
        literal(selector)
    )
}
