mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{configured_directory, directory, website, FakeDetector, FakeElement, FakePage};
use directory_submit::adapters::betalist::BetaListAdapter;
use directory_submit::adapters::crunchbase::CrunchbaseAdapter;
use directory_submit::adapters::generic::NO_FIELDS_ERROR;
use directory_submit::adapters::indiehackers::IndieHackersAdapter;
use directory_submit::adapters::producthunt::ProductHuntAdapter;
use directory_submit::adapters::{GenericAdapter, SubmissionAdapter, SubmissionInput};
use directory_submit::error::DetectionError;
use directory_submit::models::{Directory, SubmissionContent, Website};

async fn submit(
    adapter: &dyn SubmissionAdapter,
    page: &FakePage,
    directory: &Directory,
) -> directory_submit::SubmissionResult {
    submit_for(adapter, page, directory, website()).await
}

async fn submit_for(
    adapter: &dyn SubmissionAdapter,
    page: &FakePage,
    directory: &Directory,
    website: Website,
) -> directory_submit::SubmissionResult {
    let content = SubmissionContent::from_website(&website);
    let input = SubmissionInput {
        website: &website,
        directory,
        content: &content,
    };
    adapter.submit(page, &input).await.unwrap()
}

#[tokio::test(start_paused = true)]
async fn generic_auto_fills_recognised_fields() {
    let page = FakePage::new()
        .with(FakeElement::input("company_name"))
        .with(FakeElement::input("website"))
        .with(FakeElement::input("newsletter").hidden())
        .with(FakeElement::submit_button("Submit"))
        .after_submit(
            "https://dir.example/thanks",
            "Thank you! Your startup is pending review.",
        );
    let detector = Arc::new(FakeDetector::returning(&[], None));
    let adapter = GenericAdapter::new(detector.clone());

    let result = submit(&adapter, &page, &directory("Startup Base", None)).await;

    assert!(result.success, "{:?}", result);
    assert_eq!(
        result.confirmation_url.as_deref(),
        Some("https://dir.example/thanks")
    );
    assert_eq!(page.visited(), vec!["https://dir.example/submit"]);
    assert_eq!(
        page.value_of("input[name=\"company_name\"]").as_deref(),
        Some("Acme Analytics")
    );
    assert_eq!(
        page.value_of("input[name=\"website\"]").as_deref(),
        Some("https://acme.example")
    );
    assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn generic_fills_each_field_only_once() {
    let page = FakePage::new()
        .with(FakeElement::input("product_name"))
        .with(FakeElement::input("name"))
        .with(FakeElement::submit_button("Submit"));
    let adapter = GenericAdapter::new(Arc::new(FakeDetector::returning(&[], None)));

    submit(&adapter, &page, &directory("Startup Base", None)).await;

    // 精确匹配 name 优先，命中后不再尝试其他候选
    assert_eq!(page.value_of("input[name=\"name\"]").as_deref(), Some("Acme Analytics"));
    assert_eq!(page.value_of("input[name=\"product_name\"]").as_deref(), Some(""));
}

#[tokio::test(start_paused = true)]
async fn generic_follows_configured_selectors() {
    let page = FakePage::new()
        .with(FakeElement::new("input").attr("id", "n"))
        .with(FakeElement::new("input").attr("id", "u"))
        .with(FakeElement::new("button").attr("id", "s").text("Send").submits())
        .after_submit("https://dir.example/done", "Submission received");
    let adapter = GenericAdapter::new(Arc::new(FakeDetector::returning(&[], None)));
    let directory = configured_directory(&[("name", "#n"), ("url", "#u"), ("submit", "#s")]);

    let result = submit(&adapter, &page, &directory).await;

    assert!(result.success);
    assert_eq!(page.value_of("#n").as_deref(), Some("Acme Analytics"));
    assert_eq!(page.value_of("#u").as_deref(), Some("https://acme.example"));
    assert!(page.clicks().contains(&"#s".to_string()));
}

#[tokio::test(start_paused = true)]
async fn generic_reports_unconfirmed_configured_submission() {
    let page = FakePage::new()
        .with(FakeElement::new("input").attr("id", "n"))
        .with(FakeElement::new("button").attr("id", "s").submits())
        .after_submit("https://dir.example/submit", "Something went sideways");
    let adapter = GenericAdapter::new(Arc::new(FakeDetector::returning(&[], None)));
    let directory = configured_directory(&[("name", "#n"), ("submit", "#s")]);

    let result = submit(&adapter, &page, &directory).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Could not confirm submission"));
}

#[tokio::test(start_paused = true)]
async fn generic_falls_back_to_detected_fields() {
    let page = FakePage::new()
        .with(FakeElement::input("fld_1"))
        .with(FakeElement::new("textarea").attr("name", "fld_2"))
        .with(FakeElement::new("button").attr("id", "go").text("Go").submits())
        .after_submit("https://dir.example/ok", "Thanks, we will review your listing");
    let detector = Arc::new(FakeDetector::returning(
        &[
            ("name", "input[name=\"fld_1\"]"),
            ("description", "textarea[name=\"fld_2\"]"),
        ],
        Some("#go"),
    ));
    let adapter = GenericAdapter::new(detector.clone());

    let result = submit(&adapter, &page, &directory("Tiny Dir", None)).await;

    assert!(result.success, "{:?}", result);
    assert_eq!(detector.calls.load(Ordering::SeqCst), 1);
    assert_eq!(page.value_of("input[name=\"fld_1\"]").as_deref(), Some("Acme Analytics"));
    assert_eq!(
        page.value_of("textarea[name=\"fld_2\"]").as_deref(),
        Some("Privacy-friendly analytics")
    );
    assert!(page.clicks().contains(&"#go".to_string()));
}

#[tokio::test(start_paused = true)]
async fn detection_errors_become_the_submission_error() {
    let page = FakePage::new();
    let adapter = GenericAdapter::new(Arc::new(FakeDetector::failing(
        DetectionError::NoFormElements,
    )));

    let result = submit(&adapter, &page, &directory("Tiny Dir", None)).await;

    assert!(!result.success);
    assert_eq!(
        result.error,
        Some(DetectionError::NoFormElements.to_string())
    );
    assert!(page.clicks().is_empty());
    assert_eq!(page.enter_presses(), 0);
}

#[tokio::test(start_paused = true)]
async fn detected_selectors_that_fill_nothing_are_reported() {
    let page = FakePage::new().with(FakeElement::input("fld_1"));
    let adapter = GenericAdapter::new(Arc::new(FakeDetector::returning(
        &[("name", "#does-not-exist")],
        None,
    )));

    let result = submit(&adapter, &page, &directory("Tiny Dir", None)).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some(NO_FIELDS_ERROR));
}

#[tokio::test(start_paused = true)]
async fn betalist_without_session_needs_auth() {
    let page = FakePage::new().with(
        FakeElement::new("a")
            .attr("href", "/users/sign_in")
            .text("Sign in"),
    );

    let result = submit(&BetaListAdapter, &page, &directory("BetaList", Some("betalist"))).await;

    assert!(!result.success);
    assert!(result.needs_auth);
    assert_eq!(
        result.login_url.as_deref(),
        Some("https://betalist.com/users/sign_in")
    );
    assert_eq!(
        result.error.as_deref(),
        Some("Login required - BetaList requires authentication")
    );
    assert!(page.typed().is_empty());
}

/// 使用适配器自带的默认提交地址
fn site_directory(name: &str, adapter: &str) -> Directory {
    Directory {
        submission_url: None,
        ..directory(name, Some(adapter))
    }
}

#[tokio::test(start_paused = true)]
async fn indiehackers_without_session_needs_auth() {
    let page = FakePage::new().with(FakeElement::new("a").attr("href", "/sign-in").text("Sign in"));

    let result = submit(&IndieHackersAdapter, &page, &site_directory("Indie Hackers", "indiehackers")).await;

    assert!(!result.success);
    assert!(result.needs_auth);
    assert_eq!(
        result.login_url.as_deref(),
        Some("https://www.indiehackers.com/sign-in")
    );
    assert_eq!(
        result.error.as_deref(),
        Some("Login required - Indie Hackers requires authentication")
    );
    assert_eq!(page.visited(), vec!["https://www.indiehackers.com/products/new"]);
    assert!(page.typed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn indiehackers_creates_a_product_page() {
    let page = FakePage::new()
        .with(FakeElement::input("name"))
        .with(FakeElement::input("tagline"))
        .with(FakeElement::input("url"))
        .with(FakeElement::new("textarea").attr("name", "description"))
        .with(FakeElement::submit_button("Create"))
        .after_submit("https://www.indiehackers.com/products/acme-analytics", "Acme Analytics");

    let result = submit(&IndieHackersAdapter, &page, &site_directory("Indie Hackers", "indiehackers")).await;

    assert!(result.success, "{:?}", result);
    assert_eq!(
        result.live_url.as_deref(),
        Some("https://www.indiehackers.com/products/acme-analytics")
    );
    assert_eq!(page.value_of("input[name=\"name\"]").as_deref(), Some("Acme Analytics"));
    assert_eq!(
        page.value_of("input[name=\"tagline\"]").as_deref(),
        Some("Analytics for small teams")
    );
    assert_eq!(page.value_of("input[name=\"url\"]").as_deref(), Some("https://acme.example"));
    assert_eq!(
        page.value_of("textarea[name=\"description\"]").as_deref(),
        Some("Privacy-friendly analytics")
    );
}

#[tokio::test(start_paused = true)]
async fn indiehackers_staying_on_the_form_is_unconfirmed() {
    let page = FakePage::new()
        .with(FakeElement::input("name"))
        .with(FakeElement::submit_button("Create"));

    let result = submit(&IndieHackersAdapter, &page, &site_directory("Indie Hackers", "indiehackers")).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Could not confirm product creation"));
    assert_eq!(result.live_url, None);
}

#[tokio::test(start_paused = true)]
async fn producthunt_without_session_needs_auth() {
    let page = FakePage::new().with(FakeElement::new("a").attr("href", "/login").text("Log in"));

    let result = submit(&ProductHuntAdapter, &page, &site_directory("Product Hunt", "producthunt")).await;

    assert!(result.needs_auth);
    assert_eq!(
        result.login_url.as_deref(),
        Some("https://www.producthunt.com/login")
    );
    assert_eq!(page.visited(), vec!["https://www.producthunt.com/posts/new"]);
    assert!(page.typed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn producthunt_stops_when_the_name_field_is_missing() {
    // 已登录（有产品输入框），但没有可识别的名称字段
    let page = FakePage::new()
        .with(FakeElement::new("input").attr("placeholder", "Your product"))
        .with(FakeElement::new("button").text("Next"));

    let result = submit(&ProductHuntAdapter, &page, &site_directory("Product Hunt", "producthunt")).await;

    assert!(!result.success);
    assert!(!result.needs_auth);
    assert_eq!(result.error.as_deref(), Some("Could not find product name field"));
    assert!(page.typed().is_empty());
    assert!(page.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn producthunt_walks_the_wizard_and_launches() {
    let page = FakePage::new()
        .with(FakeElement::input("name"))
        .with(FakeElement::input("tagline"))
        .with(FakeElement::input("url"))
        .with(FakeElement::new("button").text("Next"))
        .with(FakeElement::new("textarea").attr("name", "description"))
        .with(FakeElement::new("button").text("Launch").submits())
        .after_submit(
            "https://www.producthunt.com/posts/acme-analytics",
            "Your product is scheduled",
        );
    let website = Website {
        tagline: Some("Analytics for small teams that care about privacy and speed everywhere".into()),
        ..website()
    };

    let result = submit_for(
        &ProductHuntAdapter,
        &page,
        &site_directory("Product Hunt", "producthunt"),
        website,
    )
    .await;

    assert!(result.success, "{:?}", result);
    assert_eq!(
        result.live_url.as_deref(),
        Some("https://www.producthunt.com/posts/acme-analytics")
    );
    // 标语截断到 60 个字符
    let tagline = page.value_of("input[name=\"tagline\"]").unwrap();
    assert_eq!(tagline.chars().count(), 60);
    assert_eq!(
        page.value_of("textarea[name=\"description\"]").as_deref(),
        Some("Privacy-friendly analytics")
    );
    // 三次"下一步"，最后点击发布
    let clicks = page.clicks();
    let next_clicks = clicks.iter().filter(|c| *c == "[data-fake-id=\"3\"]").count();
    assert_eq!(next_clicks, 3);
    assert_eq!(clicks.last().map(String::as_str), Some("[data-fake-id=\"5\"]"));
}

#[tokio::test(start_paused = true)]
async fn crunchbase_without_account_needs_auth() {
    let page = FakePage::new().with(FakeElement::new("a").attr("href", "/login").text("Log in"));

    let result = submit(&CrunchbaseAdapter, &page, &site_directory("Crunchbase", "crunchbase")).await;

    assert!(result.needs_auth);
    assert_eq!(
        result.error.as_deref(),
        Some("Login required - Crunchbase requires a free account")
    );
    assert_eq!(
        result.login_url.as_deref(),
        Some("https://www.crunchbase.com/login")
    );
    assert_eq!(page.visited(), vec!["https://www.crunchbase.com/add-new"]);
    assert!(page.typed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn crunchbase_fills_profile_and_picks_industry_suggestion() {
    let page = FakePage::new()
        .with(FakeElement::new("label").text("Company"))
        .with(FakeElement::input("name"))
        .with(FakeElement::input("website"))
        .with(FakeElement::new("textarea").attr("name", "short_description"))
        .with(FakeElement::input("industry"))
        .with(
            FakeElement::new("li")
                .attr("class", "suggestion")
                .text("Developer Tools"),
        )
        .with(FakeElement::submit_button("Submit"))
        .after_submit(
            "https://www.crunchbase.com/organization/acme-analytics",
            "Acme Analytics",
        );
    let website = Website {
        industry: Some("Developer Tools".into()),
        ..website()
    };

    let result = submit_for(
        &CrunchbaseAdapter,
        &page,
        &site_directory("Crunchbase", "crunchbase"),
        website,
    )
    .await;

    assert!(result.success, "{:?}", result);
    assert_eq!(
        result.confirmation_url.as_deref(),
        Some("https://www.crunchbase.com/organization/acme-analytics")
    );
    let clicks = page.clicks();
    // 先选择实体类型
    assert_eq!(clicks.first().map(String::as_str), Some("[data-fake-id=\"0\"]"));
    assert_eq!(page.value_of("input[name=\"name\"]").as_deref(), Some("Acme Analytics"));
    assert_eq!(
        page.value_of("input[name=\"website\"]").as_deref(),
        Some("https://acme.example")
    );
    assert_eq!(
        page.value_of("textarea[name=\"short_description\"]").as_deref(),
        Some("Privacy-friendly analytics")
    );
    assert_eq!(
        page.value_of("input[name=\"industry\"]").as_deref(),
        Some("Developer Tools")
    );
    assert!(clicks.contains(&".suggestion, [role=\"option\"]".to_string()));
}
