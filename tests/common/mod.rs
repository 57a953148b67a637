//! 集成测试共用的假实现：页面、浏览器、引擎进程、字段识别器

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use directory_submit::browser::{
    BrowserSession, EngineControl, EngineLauncher, EngineProcess, ProcessEvent,
};
use directory_submit::error::{BrowserError, BrowserResult, DetectionError};
use directory_submit::models::{AdapterConfig, Directory, Submission, Website};
use directory_submit::services::{DetectedFields, FieldDetector};
use directory_submit::{BrowserManager, BrowserSettings, PageDriver};
use tokio::sync::mpsc;

// ========== 页面 ==========

/// 假页面上的一个元素
#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
    pub visible: bool,
    pub value: String,
    pub checked: bool,
    pub options: Vec<String>,
    /// 点击后触发表单提交
    pub submits: bool,
}

impl FakeElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            visible: true,
            ..Default::default()
        }
    }

    pub fn input(name: &str) -> Self {
        Self::new("input").attr("name", name)
    }

    pub fn submit_button(text: &str) -> Self {
        Self::new("button")
            .attr("type", "submit")
            .text(text)
            .submits()
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn submits(mut self) -> Self {
        self.submits = true;
        self
    }

    pub fn options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self
    }

    fn render(&self) -> String {
        let attrs: String = self
            .attrs
            .iter()
            .filter(|(name, _)| name.as_str() != "data-fake-id")
            .map(|(name, value)| format!(" {}=\"{}\"", name, value))
            .collect();
        format!("<{}{}>{}</{}>", self.tag, attrs, self.text, self.tag)
    }
}

#[derive(Default)]
struct PageState {
    url: String,
    content: String,
    elements: Vec<FakeElement>,
    after_submit: Option<(String, String)>,
    goto_error: Option<String>,
    visited: Vec<String>,
    clicks: Vec<String>,
    typed: Vec<(String, String)>,
    enter_presses: usize,
    closes: usize,
}

/// 内存中的页面，克隆体共享同一份状态
#[derive(Clone, Default)]
pub struct FakePage {
    state: Arc<Mutex<PageState>>,
}

impl FakePage {
    pub fn new() -> Self {
        let page = Self::default();
        page.lock().content = "<html><body><h1>Add your startup</h1></body></html>".into();
        page
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap()
    }

    pub fn with(self, element: FakeElement) -> Self {
        {
            let mut state = self.lock();
            let id = state.elements.len().to_string();
            state.elements.push(element.attr("data-fake-id", &id));
        }
        self
    }

    /// 提交后跳转到的地址和页面内容
    pub fn after_submit(self, url: &str, content: &str) -> Self {
        self.lock().after_submit = Some((url.to_string(), content.to_string()));
        self
    }

    /// 所有导航都以该错误失败
    pub fn failing_goto(self, error: &str) -> Self {
        self.lock().goto_error = Some(error.to_string());
        self
    }

    /// 第一个命中元素的当前值
    pub fn value_of(&self, selector: &str) -> Option<String> {
        let state = self.lock();
        state
            .elements
            .iter()
            .find(|el| matches_selector(selector, el))
            .map(|el| el.value.clone())
    }

    pub fn visited(&self) -> Vec<String> {
        self.lock().visited.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.lock().clicks.clone()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.lock().typed.clone()
    }

    pub fn enter_presses(&self) -> usize {
        self.lock().enter_presses
    }

    pub fn closes(&self) -> usize {
        self.lock().closes
    }

    fn first_index(state: &PageState, selector: &str) -> Option<usize> {
        state
            .elements
            .iter()
            .position(|el| matches_selector(selector, el))
    }

    fn submit(state: &mut PageState) {
        if let Some((url, content)) = state.after_submit.clone() {
            state.url = url;
            state.content = content;
        }
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn prepare(&self, _user_agent: &str) -> Result<()> {
        Ok(())
    }

    async fn goto(&self, url: &str, _timeout: Duration) -> Result<()> {
        let mut state = self.lock();
        state.visited.push(url.to_string());
        if let Some(error) = state.goto_error.clone() {
            bail!(error);
        }
        state.url = url.to_string();
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        Ok(self.lock().url.clone())
    }

    async fn content(&self) -> Result<String> {
        Ok(self.lock().content.clone())
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        Ok(Self::first_index(&self.lock(), selector).is_some())
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        let state = self.lock();
        Ok(Self::first_index(&state, selector).is_some_and(|i| state.elements[i].visible))
    }

    async fn is_checked(&self, selector: &str) -> Result<bool> {
        let state = self.lock();
        Ok(Self::first_index(&state, selector).is_some_and(|i| state.elements[i].checked))
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<()> {
        if Self::first_index(&self.lock(), selector).is_none() {
            bail!("Timeout exceeded waiting for {}", selector);
        }
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let mut state = self.lock();
        let Some(index) = Self::first_index(&state, selector) else {
            bail!("Element not found: {}", selector);
        };
        state.clicks.push(selector.to_string());

        let element = &mut state.elements[index];
        if element.attrs.get("type").is_some_and(|t| t == "checkbox") {
            element.checked = !element.checked;
        }
        if element.submits {
            Self::submit(&mut state);
        }
        Ok(())
    }

    async fn clear(&self, selector: &str) -> Result<()> {
        let mut state = self.lock();
        let Some(index) = Self::first_index(&state, selector) else {
            bail!("Element not found: {}", selector);
        };
        state.elements[index].value.clear();
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str, _key_delay_ms: (u64, u64)) -> Result<()> {
        let mut state = self.lock();
        let Some(index) = Self::first_index(&state, selector) else {
            bail!("Element not found: {}", selector);
        };
        state.elements[index].value.push_str(text);
        state.typed.push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn press_enter(&self) -> Result<()> {
        let mut state = self.lock();
        state.enter_presses += 1;
        Self::submit(&mut state);
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<bool> {
        let mut state = self.lock();
        let Some(index) = Self::first_index(&state, selector) else {
            bail!("Element not found: {}", selector);
        };
        let element = &mut state.elements[index];
        let wanted = value.to_lowercase();
        let Some(option) = element
            .options
            .iter()
            .find(|o| o.to_lowercase().contains(&wanted))
            .cloned()
        else {
            return Ok(false);
        };
        element.value = option;
        Ok(true)
    }

    async fn find_by_text(&self, selector: &str, text: &str) -> Result<Option<String>> {
        let state = self.lock();
        let wanted = text.to_lowercase();
        Ok(state
            .elements
            .iter()
            .find(|el| matches_selector(selector, el) && el.text.to_lowercase().contains(&wanted))
            .and_then(|el| el.attrs.get("data-fake-id"))
            .map(|id| format!("[data-fake-id=\"{}\"]", id)))
    }

    async fn wait_for_navigation(&self, _timeout: Duration) -> Result<bool> {
        Ok(true)
    }

    async fn form_html(&self, limit: usize) -> Result<String> {
        let state = self.lock();
        let html: String = state.elements.iter().map(FakeElement::render).collect();
        Ok(html.chars().take(limit).collect())
    }

    async fn close(&self) -> Result<()> {
        self.lock().closes += 1;
        Ok(())
    }
}

// ========== 简化的 CSS 选择器匹配 ==========
//
// 支持：逗号分组、标签、#id、.class、[attr]、[attr="v"]、[attr*="v"]、[attr^="v"]、`i` 标志。
// 后代组合只看最后一段；伪类被忽略。

fn matches_selector(selector: &str, el: &FakeElement) -> bool {
    split_top_level(selector, ',')
        .iter()
        .any(|group| matches_compound(last_compound(group.trim()), el))
}

fn split_top_level(selector: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (i, c) in selector.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth -= 1,
            c if c == separator && depth == 0 => {
                parts.push(&selector[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&selector[start..]);
    parts
}

fn last_compound(group: &str) -> &str {
    let mut depth = 0;
    let mut start = 0;
    for (i, c) in group.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth -= 1,
            c if c.is_whitespace() && depth == 0 => start = i + 1,
            _ => {}
        }
    }
    &group[start..]
}

fn matches_compound(compound: &str, el: &FakeElement) -> bool {
    if compound.is_empty() {
        return false;
    }
    let mut rest = compound;

    let tag_end = rest.find(['[', '#', '.', ':']).unwrap_or(rest.len());
    let tag = &rest[..tag_end];
    if !tag.is_empty() && tag != "*" && !tag.eq_ignore_ascii_case(&el.tag) {
        return false;
    }
    rest = &rest[tag_end..];

    while let Some(c) = rest.chars().next() {
        match c {
            '[' => {
                let Some(end) = rest.find(']') else {
                    return false;
                };
                if !attr_matches(&rest[1..end], el) {
                    return false;
                }
                rest = &rest[end + 1..];
            }
            '#' | '.' => {
                let ident_end = rest[1..]
                    .find(['[', '#', '.', ':'])
                    .map_or(rest.len(), |i| i + 1);
                let ident = &rest[1..ident_end];
                let ok = if c == '#' {
                    el.attrs.get("id").is_some_and(|id| id == ident)
                } else {
                    el.attrs
                        .get("class")
                        .is_some_and(|class| class.split_whitespace().any(|x| x == ident))
                };
                if !ok {
                    return false;
                }
                rest = &rest[ident_end..];
            }
            _ => break,
        }
    }
    true
}

fn attr_matches(condition: &str, el: &FakeElement) -> bool {
    let condition = condition.trim();
    let (body, insensitive) = match condition.strip_suffix(" i") {
        Some(body) => (body.trim_end(), true),
        None => (condition, false),
    };

    let Some(eq) = body.find('=') else {
        return el.attrs.contains_key(body);
    };
    let lhs = &body[..eq];
    let (name, op) = if let Some(name) = lhs.strip_suffix('*') {
        (name, '*')
    } else if let Some(name) = lhs.strip_suffix('^') {
        (name, '^')
    } else {
        (lhs, '=')
    };
    let expected = body[eq + 1..].trim().trim_matches('"').trim_matches('\'');

    let Some(actual) = el.attrs.get(name.trim()) else {
        return false;
    };
    let (actual, expected) = if insensitive {
        (actual.to_lowercase(), expected.to_lowercase())
    } else {
        (actual.clone(), expected.to_string())
    };
    match op {
        '*' => actual.contains(&expected),
        '^' => actual.starts_with(&expected),
        _ => actual == expected,
    }
}

// ========== 字段识别 ==========

/// 返回固定结果的字段识别器
pub struct FakeDetector {
    result: Result<DetectedFields, DetectionError>,
    pub calls: AtomicUsize,
}

impl FakeDetector {
    pub fn returning(fields: &[(&str, &str)], submit: Option<&str>) -> Self {
        Self {
            result: Ok(DetectedFields {
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                submit: submit.map(str::to_string),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: DetectionError) -> Self {
        Self {
            result: Err(error),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FieldDetector for FakeDetector {
    async fn detect(
        &self,
        _page: &dyn PageDriver,
        _website: &Website,
    ) -> Result<DetectedFields, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

// ========== 引擎进程与浏览器 ==========

#[derive(Default)]
pub struct FakeControl {
    pub exited: AtomicBool,
    pub terminated: AtomicBool,
    pub killed: AtomicBool,
}

impl EngineControl for FakeControl {
    fn pid(&self) -> Option<u32> {
        Some(4242)
    }

    fn terminate(&self) -> BrowserResult<()> {
        self.terminated.store(true, Ordering::SeqCst);
        self.exited.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn kill(&self) -> BrowserResult<()> {
        self.killed.store(true, Ordering::SeqCst);
        self.exited.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}

pub struct FakeSession {
    page: FakePage,
    connected: AtomicBool,
    pub pages_opened: AtomicUsize,
}

impl FakeSession {
    /// 模拟连接在不知不觉中断开
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn is_connected_flag(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn new_page(&self) -> BrowserResult<Box<dyn PageDriver>> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BrowserError::HealthCheckFailed("Target closed".into()));
        }
        self.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.page.clone()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> BrowserResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// 记录每次启动和连接的假启动器
pub struct FakeLauncher {
    page: FakePage,
    pub spawns: AtomicUsize,
    pub connects: AtomicUsize,
    failing_connects: AtomicUsize,
    controls: Mutex<Vec<Arc<FakeControl>>>,
    senders: Mutex<Vec<mpsc::UnboundedSender<ProcessEvent>>>,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
}

impl FakeLauncher {
    pub fn new(page: FakePage) -> Self {
        Self {
            page,
            spawns: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            failing_connects: AtomicUsize::new(0),
            controls: Mutex::new(Vec::new()),
            senders: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// 接下来 `n` 次连接失败
    pub fn fail_next_connects(self, n: usize) -> Self {
        self.failing_connects.store(n, Ordering::SeqCst);
        self
    }

    pub fn spawn_count(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn last_control(&self) -> Option<Arc<FakeControl>> {
        self.controls.lock().unwrap().last().cloned()
    }

    pub fn last_session(&self) -> Option<Arc<FakeSession>> {
        self.sessions.lock().unwrap().last().cloned()
    }

    /// 模拟引擎进程意外退出
    pub fn crash_engine(&self, code: i32) {
        if let Some(control) = self.last_control() {
            control.exited.store(true, Ordering::SeqCst);
        }
        if let Some(sender) = self.senders.lock().unwrap().last() {
            let _ = sender.send(ProcessEvent::Exited { code: Some(code) });
        }
    }
}

#[async_trait]
impl EngineLauncher for FakeLauncher {
    async fn spawn(&self) -> BrowserResult<EngineProcess> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        let control = Arc::new(FakeControl::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(ProcessEvent::Ready);

        self.controls.lock().unwrap().push(Arc::clone(&control));
        self.senders.lock().unwrap().push(tx);
        Ok(EngineProcess {
            control,
            events: rx,
        })
    }

    async fn connect(&self) -> BrowserResult<Arc<dyn BrowserSession>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_connects.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_connects.store(remaining - 1, Ordering::SeqCst);
            return Err(BrowserError::ConnectionFailed {
                endpoint: "ws://127.0.0.1:9222".into(),
                reason: "connection refused".into(),
            });
        }

        let session = Arc::new(FakeSession {
            page: self.page.clone(),
            connected: AtomicBool::new(true),
            pages_opened: AtomicUsize::new(0),
        });
        self.sessions.lock().unwrap().push(Arc::clone(&session));
        Ok(session)
    }
}

pub fn manager(launcher: &Arc<FakeLauncher>) -> Arc<BrowserManager> {
    Arc::new(BrowserManager::new(
        Arc::clone(launcher) as Arc<dyn EngineLauncher>,
        BrowserSettings::default(),
    ))
}

// ========== 业务数据 ==========

pub fn website() -> Website {
    Website {
        id: "w1".into(),
        name: "Acme Analytics".into(),
        url: "https://acme.example".into(),
        tagline: Some("Analytics for small teams".into()),
        description_short: Some("Privacy-friendly analytics".into()),
        contact_email: Some("hello@acme.example".into()),
        ..Default::default()
    }
}

pub fn directory(name: &str, adapter: Option<&str>) -> Directory {
    Directory {
        id: format!("d-{}", name),
        name: name.into(),
        url: "https://dir.example".into(),
        submission_url: Some("https://dir.example/submit".into()),
        adapter_name: adapter.map(str::to_string),
        ..Default::default()
    }
}

pub fn configured_directory(fields: &[(&str, &str)]) -> Directory {
    Directory {
        adapter_config: Some(AdapterConfig {
            form_fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }),
        ..directory("Configured", None)
    }
}

pub fn job(id: &str, directory: Option<Directory>) -> Submission {
    Submission {
        id: id.into(),
        website_id: Some("w1".into()),
        directory_id: directory.as_ref().map(|d| d.id.clone()),
        website: Some(website()),
        directory,
        created_at: Some(chrono::Utc::now()),
        ..Default::default()
    }
}
