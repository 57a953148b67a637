//! 页面驱动 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"操作页面"的能力：导航、查询、点击、输入、执行 JS。
//! 不认识网站、目录、作业，也不处理业务流程。

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::Page;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::error::BrowserError;

/// 页面能力
///
/// 所有选择器都是标准 CSS 选择器；`:has-text()` 之类的扩展语法由 [`PageDriver::find_by_text`] 代替。
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// 设置桌面 UA 等页面属性（引擎不支持时可忽略）
    async fn prepare(&self, user_agent: &str) -> Result<()>;

    /// 导航到指定地址，超时返回 "Navigation timeout" 错误
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    async fn url(&self) -> Result<String>;

    async fn content(&self) -> Result<String>;

    /// 选择器是否命中任一元素
    async fn exists(&self, selector: &str) -> Result<bool>;

    /// 第一个命中元素是否可见且位于视口内
    async fn is_visible(&self, selector: &str) -> Result<bool>;

    /// 第一个命中元素（复选框）是否已勾选
    async fn is_checked(&self, selector: &str) -> Result<bool>;

    /// 等待元素出现
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    async fn click(&self, selector: &str) -> Result<()>;

    /// 清空输入框的值
    async fn clear(&self, selector: &str) -> Result<()>;

    /// 逐字输入，每次按键之间随机停顿 `key_delay_ms` 毫秒
    async fn type_text(&self, selector: &str, text: &str, key_delay_ms: (u64, u64)) -> Result<()>;

    /// 在当前焦点元素上按回车
    async fn press_enter(&self) -> Result<()>;

    /// 选择下拉框选项（按 value 或可见文本匹配），返回是否选中
    async fn select_option(&self, selector: &str, value: &str) -> Result<bool>;

    /// 在 `selector` 命中的元素里查找文本包含 `text` 的第一个，返回能唯一定位它的选择器
    async fn find_by_text(&self, selector: &str, text: &str) -> Result<Option<String>>;

    /// 等待导航完成，超时返回 `false`
    async fn wait_for_navigation(&self, timeout: Duration) -> Result<bool>;

    /// 表单 HTML（无 `<form>` 时退回所有 input/textarea/select），按字符截断
    async fn form_html(&self, limit: usize) -> Result<String>;

    async fn close(&self) -> Result<()>;
}

/// 基于 chromiumoxide 的页面驱动
pub struct CdpPage {
    page: Page,
}

impl CdpPage {
    /// 创建新的页面驱动
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let result = self
            .page
            .evaluate(js_code.into())
            .await
            .map_err(BrowserError::from)?;
        // JS 返回 null / undefined 时没有 value 字段
        let json_value = result.value().cloned().unwrap_or(JsonValue::Null);
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 在第一个命中元素上执行一段 JS（变量 `el`），元素不存在时返回 `null`
    async fn with_element<T: DeserializeOwned>(&self, selector: &str, body: &str) -> Result<T> {
        let js = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return null; {} }})()",
            js_string(selector),
            body
        );
        self.eval_as(js).await
    }
}

/// 把 Rust 字符串编码成 JS 字符串字面量
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn element_not_found(selector: &str) -> anyhow::Error {
    anyhow::anyhow!("Element not found: {}", selector)
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn prepare(&self, user_agent: &str) -> Result<()> {
        if let Err(e) = self
            .page
            .set_user_agent(SetUserAgentOverrideParams::new(user_agent))
            .await
        {
            debug!("引擎不支持设置 UA，忽略: {}", e);
        }
        Ok(())
    }

    async fn goto(&self, url: &str, limit: Duration) -> Result<()> {
        match timeout(limit, self.page.goto(url)).await {
            Ok(result) => {
                result.map_err(BrowserError::from)?;
                Ok(())
            }
            Err(_) => anyhow::bail!(
                "Navigation timeout of {} ms exceeded: {}",
                limit.as_millis(),
                url
            ),
        }
    }

    async fn url(&self) -> Result<String> {
        let url = self.page.url().await.map_err(BrowserError::from)?;
        Ok(url.unwrap_or_default())
    }

    async fn content(&self) -> Result<String> {
        Ok(self.page.content().await.map_err(BrowserError::from)?)
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        let js = format!("document.querySelector({}) !== null", js_string(selector));
        self.eval_as(js).await
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        // 无布局引擎时矩形全为 0，此时只看样式
        let visible: Option<bool> = self
            .with_element(
                selector,
                r#"
                const style = window.getComputedStyle ? window.getComputedStyle(el) : null;
                if (style && (style.display === 'none' || style.visibility === 'hidden')) return false;
                if (el.type === 'hidden' || el.hidden) return false;
                if (!el.getBoundingClientRect) return true;
                const r = el.getBoundingClientRect();
                if (r.width === 0 && r.height === 0 && r.top === 0 && r.left === 0) return true;
                const vw = window.innerWidth || document.documentElement.clientWidth;
                const vh = window.innerHeight || document.documentElement.clientHeight;
                return r.bottom > 0 && r.right > 0 && r.top < vh && r.left < vw;
                "#,
            )
            .await?;
        Ok(visible.unwrap_or(false))
    }

    async fn is_checked(&self, selector: &str) -> Result<bool> {
        let checked: Option<bool> = self.with_element(selector, "return !!el.checked;").await?;
        Ok(checked.unwrap_or(false))
    }

    async fn wait_for_selector(&self, selector: &str, limit: Duration) -> Result<()> {
        let poll = async {
            loop {
                if self.exists(selector).await? {
                    return Ok::<(), anyhow::Error>(());
                }
                sleep(Duration::from_millis(100)).await;
            }
        };
        match timeout(limit, poll).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!(
                "waiting for selector `{}` failed: timeout {}ms exceeded",
                selector,
                limit.as_millis()
            ),
        }
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| element_not_found(selector))?;
        element.click().await.map_err(BrowserError::from)?;
        Ok(())
    }

    async fn clear(&self, selector: &str) -> Result<()> {
        let cleared: Option<bool> = self
            .with_element(
                selector,
                r#"
                if ('value' in el) {
                    el.value = '';
                    el.dispatchEvent(new Event('input', { bubbles: true }));
                }
                return true;
                "#,
            )
            .await?;
        cleared.map(|_| ()).ok_or_else(|| element_not_found(selector))
    }

    async fn type_text(&self, selector: &str, text: &str, key_delay_ms: (u64, u64)) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| element_not_found(selector))?;
        element.click().await.map_err(BrowserError::from)?;

        let (min, max) = key_delay_ms;
        for ch in text.chars() {
            element
                .type_str(ch.to_string())
                .await
                .map_err(BrowserError::from)?;
            let delay = if max > min {
                rand::thread_rng().gen_range(min..max)
            } else {
                min
            };
            sleep(Duration::from_millis(delay)).await;
        }
        Ok(())
    }

    async fn press_enter(&self) -> Result<()> {
        let marked: bool = self
            .eval_as(
                r#"(() => {
                    document.querySelectorAll('[data-ds-focus]')
                        .forEach(n => n.removeAttribute('data-ds-focus'));
                    const el = document.activeElement;
                    if (!el || el === document.body) return false;
                    el.setAttribute('data-ds-focus', '1');
                    return true;
                })()"#,
            )
            .await?;
        let selector = if marked { "[data-ds-focus]" } else { "body" };
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| element_not_found(selector))?;
        element.press_key("Enter").await.map_err(BrowserError::from)?;
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<bool> {
        let body = format!(
            r#"
            const wanted = {}.toLowerCase();
            const options = Array.from(el.options || []);
            const hit = options.find(o => o.value.toLowerCase() === wanted)
                || options.find(o => o.textContent.trim().toLowerCase() === wanted)
                || options.find(o => o.textContent.toLowerCase().includes(wanted));
            if (!hit) return false;
            el.value = hit.value;
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
            "#,
            js_string(value)
        );
        let selected: Option<bool> = self.with_element(selector, &body).await?;
        Ok(selected.unwrap_or(false))
    }

    async fn find_by_text(&self, selector: &str, text: &str) -> Result<Option<String>> {
        let js = format!(
            r#"(() => {{
                const wanted = {}.toLowerCase();
                const hit = Array.from(document.querySelectorAll({}))
                    .find(el => (el.textContent || el.value || '').toLowerCase().includes(wanted));
                if (!hit) return null;
                const probe = 'p' + Math.random().toString(36).slice(2);
                hit.setAttribute('data-ds-probe', probe);
                return '[data-ds-probe="' + probe + '"]';
            }})()"#,
            js_string(text),
            js_string(selector)
        );
        self.eval_as(js).await
    }

    async fn wait_for_navigation(&self, limit: Duration) -> Result<bool> {
        match timeout(limit, self.page.wait_for_navigation()).await {
            Ok(result) => {
                result.map_err(BrowserError::from)?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    async fn form_html(&self, limit: usize) -> Result<String> {
        let html: String = self
            .eval_as(
                r#"(() => {
                    const forms = document.querySelectorAll('form');
                    const nodes = forms.length > 0
                        ? Array.from(forms)
                        : Array.from(document.querySelectorAll('input, textarea, select'));
                    return nodes.map(n => n.outerHTML).join('\n');
                })()"#,
            )
            .await
            .context("读取表单 HTML 失败")?;
        Ok(html.chars().take(limit).collect())
    }

    async fn close(&self) -> Result<()> {
        self.page
            .clone()
            .close()
            .await
            .map_err(BrowserError::from)?;
        Ok(())
    }
}
