#[cfg(test)]
mod tests {
    use core::cell::RefCell;
    use core::time::Duration;
    use futures::FutureExt as _;
    use image::{ImageFormat, Rgba, RgbaImage};
    use loom_core::{Error, Result};
    use loom_resources::{Image, ImageCache, MemoryBundle, Scheduler, ScriptedTransport, TemplateCache};
    use std::io::Cursor;
    use std::rc::Rc;
    use std::thread;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let pixels = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
        let mut encoded = Cursor::new(Vec::new());
        pixels
            .write_to(&mut encoded, ImageFormat::Png)
            .map(|()| encoded.into_inner())
            .unwrap_or_default()
    }

    type Outcomes = Rc<RefCell<Vec<Result<Rc<Image>>>>>;

    fn request_images(scheduler: &Scheduler, cache: &ImageCache, uri: &str, waiters: usize) -> Outcomes {
        let outcomes: Outcomes = Rc::new(RefCell::new(Vec::new()));
        for _ in 0..waiters {
            let fetch = cache.get_image(uri);
            let sink = Rc::clone(&outcomes);
            scheduler.spawn(async move {
                let outcome = fetch.await;
                sink.borrow_mut().push(outcome);
            });
        }
        outcomes
    }

    #[test]
    fn concurrent_image_requests_share_one_fetch() {
        let _init = env_logger::builder().is_test(true).try_init();
        let mut scheduler = Scheduler::new();
        let transport = ScriptedTransport::new();
        transport.respond_after("https://cdn.test/hero.png", 3, 200, png(4, 4));
        let cache = ImageCache::new(
            Rc::new(MemoryBundle::new()),
            Rc::new(transport.clone()),
            scheduler.spawner(),
            None,
        );

        let outcomes = request_images(&scheduler, &cache, "https://cdn.test/hero.png", 3);
        assert_eq!(scheduler.run_until_idle(100).map(|ticks| ticks > 0), Some(true));

        assert_eq!(transport.request_count("https://cdn.test/hero.png"), 1);
        assert_eq!(cache.fetch_count(), 1);
        let outcomes = outcomes.borrow();
        assert_eq!(outcomes.len(), 3);
        let images: Vec<&Rc<Image>> = outcomes.iter().filter_map(|outcome| outcome.as_ref().ok()).collect();
        assert_eq!(images.len(), 3);
        assert!(images.windows(2).all(|pair| Rc::ptr_eq(pair[0], pair[1])));
    }

    #[test]
    fn failed_fetch_is_shared_and_retried_later() {
        let _init = env_logger::builder().is_test(true).try_init();
        let mut scheduler = Scheduler::new();
        let transport = ScriptedTransport::new();
        transport.respond_after("https://cdn.test/flaky.png", 1, 503, Vec::new());
        let cache = ImageCache::new(
            Rc::new(MemoryBundle::new()),
            Rc::new(transport.clone()),
            scheduler.spawner(),
            None,
        );

        let outcomes = request_images(&scheduler, &cache, "https://cdn.test/flaky.png", 2);
        scheduler.run_until_idle(100);
        assert!(
            outcomes
                .borrow()
                .iter()
                .all(|outcome| matches!(outcome, Err(Error::NetworkError { status: Some(503), .. })))
        );
        assert_eq!(transport.request_count("https://cdn.test/flaky.png"), 1);
        assert!(!cache.contains("https://cdn.test/flaky.png"));

        transport.respond("https://cdn.test/flaky.png", 200, png(1, 1));
        let retried = request_images(&scheduler, &cache, "https://cdn.test/flaky.png", 1);
        scheduler.run_until_idle(100);
        assert!(retried.borrow().iter().all(Result::is_ok));
        assert_eq!(transport.request_count("https://cdn.test/flaky.png"), 2);
        assert!(cache.contains("https://cdn.test/flaky.png"));
    }

    #[test]
    fn timed_out_image_leaves_no_entry() {
        let _init = env_logger::builder().is_test(true).try_init();
        let mut scheduler = Scheduler::new();
        let transport = ScriptedTransport::new();
        transport.hang("https://cdn.test/slow.png");
        let cache = ImageCache::new(
            Rc::new(MemoryBundle::new()),
            Rc::new(transport.clone()),
            scheduler.spawner(),
            Some(Duration::from_millis(10)),
        );

        let outcomes = request_images(&scheduler, &cache, "https://cdn.test/slow.png", 2);
        for _ in 0..1000 {
            if scheduler.is_idle() {
                break;
            }
            scheduler.tick();
            thread::sleep(Duration::from_millis(1));
        }
        assert!(scheduler.is_idle());
        assert!(
            outcomes
                .borrow()
                .iter()
                .all(|outcome| matches!(outcome, Err(Error::NetworkTimeout { .. })))
        );
        assert_eq!(transport.aborted(), 1);
        assert!(!cache.contains("https://cdn.test/slow.png"));
    }

    #[test]
    fn abandoned_requester_still_fills_the_cache() {
        let _init = env_logger::builder().is_test(true).try_init();
        let mut scheduler = Scheduler::new();
        let bundle = MemoryBundle::new();
        bundle.insert("Views/Default/img", &b"{\"kind\":\"image\"}"[..]);
        let cache = TemplateCache::new(Rc::new(bundle.clone()), scheduler.spawner());

        drop(cache.load("resources://Views/Default/img"));
        assert_eq!(scheduler.run_until_idle(10).map(|ticks| ticks > 0), Some(true));
        assert!(cache.contains("Views/Default/img"));

        let cached = cache.load("Views/Default/img");
        let template = cached.now_or_never();
        assert!(matches!(template, Some(Ok(ref found)) if !found.is_placeholder()));
        assert_eq!(bundle.load_count("Views/Default/img"), 1);
    }
}
