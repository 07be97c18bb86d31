#![allow(dead_code, reason = "each test binary uses a different subset of helpers")]

use core::time::Duration;
use image::{ImageFormat, Rgba, RgbaImage};
use loom_core::{Attributes, BuiltinTag, LayoutNode, NodeKey, NodeKind, Rect, TagCode};
use loom_materializer::{DocumentView, ViewEvent};
use loom_resources::{LoomConfig, MemoryBundle, ResourceServices, Scheduler, ScriptedTransport};
use std::io::Cursor;
use std::rc::Rc;
use std::thread;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

pub struct Harness {
    pub scheduler: Scheduler,
    pub bundle: MemoryBundle,
    pub transport: ScriptedTransport,
    pub services: ResourceServices,
}

impl Harness {
    pub fn start() -> Self {
        let _init = env_logger::builder().is_test(true).try_init();
        let scheduler = Scheduler::new();
        let bundle = MemoryBundle::new();
        bundle.insert("Views/Default/img", "img-template");
        bundle.insert("Views/Default/_text", "text-template");
        let transport = ScriptedTransport::new();
        let services = ResourceServices::new(
            LoomConfig::default(),
            scheduler.spawner(),
            Rc::new(bundle.clone()),
            Rc::new(transport.clone()),
        );
        Self {
            scheduler,
            bundle,
            transport,
            services,
        }
    }

    pub fn view(&self) -> (DocumentView, UnboundedReceiver<ViewEvent>) {
        let (events, receiver) = unbounded_channel();
        (DocumentView::new(self.services.clone(), events), receiver)
    }

    /// Tick until idle, returning whether the scheduler got there.
    pub fn settle(&mut self) -> bool {
        self.scheduler.run_until_idle(1_000).is_some()
    }

    /// Tick with short pauses so wall-clock deadlines can pass.
    pub fn settle_slowly(&mut self, budget: u32) -> bool {
        for _ in 0..budget {
            if self.scheduler.is_idle() {
                return true;
            }
            self.scheduler.tick();
            thread::sleep(Duration::from_millis(1));
        }
        self.scheduler.is_idle()
    }
}

pub fn drain(receiver: &mut UnboundedReceiver<ViewEvent>) -> Vec<ViewEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let pixels = RgbaImage::from_pixel(width, height, Rgba([10, 120, 200, 255]));
    let mut encoded = Cursor::new(Vec::new());
    pixels
        .write_to(&mut encoded, ImageFormat::Png)
        .map(|()| encoded.into_inner())
        .unwrap_or_default()
}

pub fn body() -> LayoutNode {
    LayoutNode::new(NodeKey::ROOT, BuiltinTag::Body.code(), NodeKind::Container)
}

pub fn node(key: u64, tag: TagCode, kind: NodeKind, attrs: Attributes) -> LayoutNode {
    LayoutNode::new(NodeKey(key), tag, kind)
        .with_attrs(attrs)
        .with_rect(Rect::new(0.0, 0.0, 32.0, 32.0))
}

pub fn div(key: u64, attrs: Attributes) -> LayoutNode {
    node(key, BuiltinTag::Div.code(), NodeKind::Container, attrs)
}

pub fn img(key: u64, attrs: Attributes) -> LayoutNode {
    node(key, BuiltinTag::Img.code(), NodeKind::ContentImage, attrs)
}

pub fn text(key: u64, content: &str) -> LayoutNode {
    node(
        key,
        BuiltinTag::Text.code(),
        NodeKind::ContentText,
        Attributes {
            text: Some(content.to_owned()),
            ..Attributes::default()
        },
    )
}

pub fn button(id: &str, src: &str) -> Attributes {
    Attributes {
        button: true,
        id: Some(id.to_owned()),
        src: Some(src.to_owned()),
        ..Attributes::default()
    }
}

/// Hidden until `target` is tapped.
pub fn listening(target: &str) -> Attributes {
    Attributes {
        hidden: Some(true),
        listen: Some(target.to_owned()),
        ..Attributes::default()
    }
}

pub fn hidden() -> Attributes {
    Attributes {
        hidden: Some(true),
        ..Attributes::default()
    }
}
