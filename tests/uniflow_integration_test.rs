#[cfg(feature = "integration-tests")]
use haunted_house::{
    config::SceneConfig,
    context::Context,
    flow::{FlowConstructor, GraphicsFlow, ImageTestResult, Out},
    render::Render,
};

#[cfg(feature = "integration-tests")]
use crate::common::test_utils::State;

#[cfg(feature = "integration-tests")]
mod common;

enum Event {
    Test,
}

struct GraphicsElement;

#[cfg(feature = "integration-tests")]
impl GraphicsFlow<State, Event> for GraphicsElement {
    fn on_init(&mut self, ctx: &mut Context, state: &mut State) -> Out<State, Event> {
        ctx.tick_duration_millis = 50;
        assert_eq!(state.frame_counter(), 0);
        assert_eq!(state.init_invocations(), 0);
        assert_eq!(state.update_invocations(), 0);

        state.init();
        Out::Configure(Box::new(|ctx: &mut Context| {
            ctx.clear_colour = wgpu::Color::BLACK;
        }))
    }

    fn on_update(&mut self, ctx: &Context, state: &mut State, _: std::time::Duration) -> Out<State, Event> {
        assert_eq!(state.frame_counter(), state.update_invocations());
        assert_eq!(state.init_invocations(), 1);
        assert_eq!(ctx.clear_colour, wgpu::Color::BLACK);
        state.frame();
        state.update();

        let serve_sencha: Box<dyn FnOnce(&mut State)> = Box::new(|state: &mut State| {
            state.dummy_state.push('🍵');
        });
        let serve_mate: Box<dyn FnOnce(&mut State)> = Box::new(|state: &mut State| {
            state.dummy_state.push('🧉');
        });
        match state.frame_counter() {
            3 => Out::FutEvent(vec![Box::new(async move { Event::Test })]),
            5 => Out::FutFn(vec![
                Box::new(async move { serve_sencha }),
                Box::new(async move { serve_mate }),
            ]),
            x if x > 5 => {
                assert!(state.dummy_state.contains('🧉'));
                assert!(state.dummy_state.contains('🍵'));
                // both emojis are 4 bytes long
                assert_eq!(state.dummy_state.len(), 8, "{}", state.dummy_state);
                Out::Empty
            }
            _ => Out::Empty,
        }
    }

    fn on_tick(&mut self, _: &Context, _: &mut State) -> Out<State, Event> {
        Out::Empty
    }

    fn on_device_events(&mut self, _: &Context, _: &mut State, _: &haunted_house::DeviceEvent) -> Out<State, Event> {
        Out::Empty
    }

    fn on_window_events(&mut self, _: &Context, _: &mut State, _: &haunted_house::WindowEvent) -> Out<State, Event> {
        Out::Empty
    }

    fn on_custom_events(&mut self, _: &Context, state: &mut State, _: Event) -> Option<Event> {
        // the event is sent in frame 3
        assert!(state.frame_counter() >= 3);
        assert!(state.update_invocations() >= 3);
        None
    }

    fn on_render<'pass>(&self) -> Render<'_, 'pass> {
        Render::None
    }

    fn render_to_texture(&self, _: &Context, state: &mut State, _: &mut image::RgbaImage) -> anyhow::Result<ImageTestResult> {
        if state.frame_counter() > 8 {
            Ok(ImageTestResult::Passed)
        } else {
            Ok(ImageTestResult::Waiting)
        }
    }
}

#[test]
#[cfg(feature = "integration-tests")]
fn should_run_every_lifecycle_hook_in_order() {
    let constructor: FlowConstructor<State, Event> = Box::new(|_| {
        Box::pin(async move {
            let flow: Box<dyn GraphicsFlow<State, Event>> = Box::new(GraphicsElement);
            anyhow::Ok(flow)
        })
    });

    if let Err(e) = haunted_house::flow::run(SceneConfig::default(), vec![constructor]) {
        panic!("{e:#}");
    }
}
