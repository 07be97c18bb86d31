mod support;

#[cfg(test)]
mod tests {
    use core::cell::Cell;
    use loom_core::{Attributes, LayoutNode, NodeKey, Result};
    use loom_materializer::{Relayout, ViewEvent};
    use std::rc::Rc;
    use crate::support::{Harness, body, button, drain, img, listening, png};

    /// Image button `b` and an image that appears while `b` is toggled on.
    fn toggled_tree() -> LayoutNode {
        let revealed = Attributes {
            src: Some(String::from("icons/c")),
            ..listening("b")
        };
        body()
            .with_child(img(1, button("b", "icons/b")))
            .with_child(img(2, revealed))
    }

    fn harness_with_icons() -> Harness {
        let harness = Harness::start();
        harness.bundle.insert("icons/b", png(2, 2));
        harness.bundle.insert("icons/c", png(4, 4));
        harness
    }

    #[test]
    fn tapping_a_button_toggles_its_listeners() -> Result<()> {
        let mut harness = harness_with_icons();
        let (mut view, mut events) = harness.view();
        view.set_tree(toggled_tree());
        view.materialize();
        assert!(harness.settle());
        assert_eq!(view.tree().attached_count(), 1);
        assert_eq!(view.listeners("b"), [NodeKey(2)]);

        assert!(view.tap("b")?);
        assert!(harness.settle());
        assert_eq!(view.tree().attached_count(), 2);
        assert_eq!(harness.bundle.load_count("Views/Default/img"), 1);
        assert_eq!(harness.bundle.load_count("icons/b"), 1);
        assert_eq!(harness.bundle.load_count("icons/c"), 1);
        let revealed = view.instance(NodeKey(2));
        {
            let tree = view.tree();
            let order: Vec<_> = tree.children(tree.root());
            assert_eq!(order.len(), 2);
            assert_eq!(order.get(1).copied(), revealed);
            assert!(revealed
                .and_then(|id| tree.get(id))
                .is_some_and(|visual| visual.image.is_some()));
        }

        assert!(view.tap("b")?);
        assert!(harness.settle());
        assert_eq!(view.tree().attached_count(), 1);
        assert!(revealed.is_some_and(|id| view.tree().is_parked(id)));

        assert!(view.tap("b")?);
        assert!(harness.settle());
        assert_eq!(view.tree().attached_count(), 2);
        assert_eq!(view.instance(NodeKey(2)), revealed);
        assert_eq!(harness.bundle.load_count("icons/c"), 1);
        assert_eq!(harness.bundle.load_count("Views/Default/img"), 1);

        let events = drain(&mut events);
        let taps = events
            .iter()
            .filter(|event| matches!(event, ViewEvent::NodeTapped { id, src } if id == "b" && src == "icons/b"))
            .count();
        assert_eq!(taps, 3);
        assert!(events.contains(&ViewEvent::Materialized { pass: 4, nodes: 2 }));
        Ok(())
    }

    /// Button `a` reveals button `m`, which reveals node 3.
    fn chained_tree() -> LayoutNode {
        let middle = Attributes {
            button: true,
            id: Some(String::from("m")),
            src: Some(String::from("icons/b")),
            ..listening("a")
        };
        body()
            .with_child(img(1, button("a", "icons/b")))
            .with_child(img(2, middle))
            .with_child(img(3, listening("m")))
    }

    #[test]
    fn visibility_does_not_cascade_through_listener_chains() -> Result<()> {
        let mut harness = harness_with_icons();
        let (mut view, _events) = harness.view();
        view.set_tree(chained_tree());
        view.materialize();
        assert!(harness.settle());
        assert_eq!(view.tree().attached_count(), 1);

        view.tap("a")?;
        assert!(harness.settle());
        assert_eq!(view.tree().attached_count(), 2);
        assert!(view.instance(NodeKey(3)).is_none());

        view.tap("m")?;
        assert!(harness.settle());
        assert_eq!(view.tree().attached_count(), 3);

        // Hiding `m` leaves node 3 shown, and the hidden `m` stops reacting.
        view.tap("a")?;
        assert!(harness.settle());
        assert_eq!(view.tree().attached_count(), 2);
        assert!(!view.tap("m")?);
        assert!(harness.settle());
        assert_eq!(view.tree().attached_count(), 2);
        assert!(view.instance(NodeKey(3)).is_some_and(|id| view.tree().is_attached(id)));
        Ok(())
    }

    #[test]
    fn parked_buttons_ignore_taps() -> Result<()> {
        let mut harness = harness_with_icons();
        let (mut view, mut events) = harness.view();
        view.set_tree(chained_tree());
        view.materialize();
        assert!(harness.settle());

        assert!(view.tap("a")?);
        assert!(harness.settle());
        assert!(view.interactive("m").is_some());
        assert!(view.tap("a")?);
        assert!(harness.settle());
        assert!(view.instance(NodeKey(2)).is_some_and(|id| view.tree().is_parked(id)));
        assert!(view.interactive("m").is_none());
        drain(&mut events);

        assert!(!view.tap("m")?);
        assert!(harness.settle());
        assert!(view.instance(NodeKey(3)).is_none());
        assert_eq!(view.tree().attached_count(), 1);
        assert!(drain(&mut events).is_empty());
        Ok(())
    }

    #[test]
    fn button_src_wins_over_href() -> Result<()> {
        let mut harness = harness_with_icons();
        let (mut view, mut events) = harness.view();
        let both = Attributes {
            href: Some(String::from("https://example.test/more")),
            ..button("more", "icons/b")
        };
        view.set_tree(body().with_child(img(1, both)));
        view.materialize();
        assert!(harness.settle());
        drain(&mut events);

        assert_eq!(
            view.interactive("more").map(|entry| entry.uri),
            Some(String::from("icons/b"))
        );
        assert!(view.tap("more")?);
        assert_eq!(
            drain(&mut events),
            [
                ViewEvent::LinkTapped {
                    id: String::from("more"),
                    href: String::from("https://example.test/more"),
                },
                ViewEvent::NodeTapped {
                    id: String::from("more"),
                    src: String::from("icons/b"),
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn links_emit_their_href() -> Result<()> {
        let mut harness = harness_with_icons();
        let (mut view, mut events) = harness.view();
        let link = Attributes {
            id: Some(String::from("home")),
            href: Some(String::from("https://example.test/")),
            ..Attributes::default()
        };
        view.set_tree(body().with_child(img(1, link)));
        view.materialize();
        assert!(harness.settle());
        drain(&mut events);

        assert_eq!(
            view.interactive("home").map(|entry| entry.uri),
            Some(String::from("https://example.test/"))
        );
        assert!(view.tap("home")?);
        assert_eq!(
            drain(&mut events),
            [ViewEvent::LinkTapped {
                id: String::from("home"),
                href: String::from("https://example.test/")
            }]
        );
        assert!(!view.tap("nowhere")?);
        Ok(())
    }

    struct CountingLayout(Rc<Cell<u32>>);

    impl Relayout for CountingLayout {
        fn relayout(&mut self, root: &mut LayoutNode) -> Result<()> {
            self.0.set(self.0.get() + 1);
            if let Some(revealed) = root.find_mut(NodeKey(2)) {
                revealed.rect.y = 40.0;
            }
            Ok(())
        }
    }

    #[test]
    fn taps_relayout_before_reloading() -> Result<()> {
        let mut harness = harness_with_icons();
        let relayouts = Rc::new(Cell::new(0));
        let (view, _events) = harness.view();
        let mut view = view.with_relayout(CountingLayout(Rc::clone(&relayouts)));
        view.set_tree(toggled_tree());
        view.materialize();
        assert!(harness.settle());

        view.tap("b")?;
        assert!(harness.settle());
        assert_eq!(relayouts.get(), 1);
        let tree = view.tree();
        let rect = view
            .instance(NodeKey(2))
            .and_then(|id| tree.get(id))
            .map(|visual| visual.rect.y);
        assert_eq!(rect, Some(40.0));
        Ok(())
    }

    #[test]
    fn reset_forgets_every_instance() {
        let mut harness = harness_with_icons();
        let (mut view, _events) = harness.view();
        view.set_tree(toggled_tree());
        view.materialize();
        assert!(harness.settle());

        view.reset();
        assert_eq!(view.tree().attached_count(), 0);
        assert!(view.instance(NodeKey(1)).is_none());
        assert!(view.listeners("b").is_empty());
        assert!(view.interactive("b").is_none());

        view.materialize();
        assert!(harness.settle());
        assert_eq!(view.tree().attached_count(), 1);
        assert_eq!(harness.bundle.load_count("Views/Default/img"), 1);
    }
}
