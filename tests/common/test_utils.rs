#![allow(dead_code)]

#[cfg(feature = "integration-tests")]
use haunted_house::flow::ImageTestResult;
use haunted_house::{
    config::SceneConfig,
    context::Context,
    flow::{FlowConstructor, GraphicsFlow, Out},
    render::Render,
};

pub(crate) struct State {
    frame_counter: u32,
    init_invocations: u32,
    update_invocations: u32,
    pub dummy_state: String,
}

impl State {
    pub fn new() -> Self {
        Self {
            frame_counter: 0,
            init_invocations: 0,
            update_invocations: 0,
            dummy_state: String::new(),
        }
    }

    pub fn frame(&mut self) {
        self.frame_counter += 1;
    }

    pub fn init(&mut self) {
        self.init_invocations += 1;
    }

    pub fn update(&mut self) {
        self.update_invocations += 1;
    }

    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    pub fn init_invocations(&self) -> u32 {
        self.init_invocations
    }

    pub fn update_invocations(&self) -> u32 {
        self.update_invocations
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
pub(crate) struct FrameCounter(pub(crate) u32);

impl FrameCounter {
    pub(crate) fn frame(&self) -> u32 {
        self.0
    }

    pub(crate) fn progress(&mut self) {
        self.0 += 1;
    }
}

#[cfg(feature = "integration-tests")]
pub(crate) type Validate = dyn Fn(&Context, &FrameCounter, &image::RgbaImage) -> anyhow::Result<ImageTestResult>;

/// Wraps a flow, counts its frames and checks every rendered frame with `validate`.
#[cfg(feature = "integration-tests")]
pub(crate) struct Inspected {
    pub(crate) inner: Box<dyn GraphicsFlow<FrameCounter, ()>>,
    pub(crate) validate: Box<Validate>,
}

#[cfg(feature = "integration-tests")]
impl GraphicsFlow<FrameCounter, ()> for Inspected {
    fn on_init(&mut self, ctx: &mut Context, state: &mut FrameCounter) -> Out<FrameCounter, ()> {
        self.inner.on_init(ctx, state)
    }

    fn on_update(&mut self, ctx: &Context, state: &mut FrameCounter, dt: std::time::Duration) -> Out<FrameCounter, ()> {
        state.progress();
        self.inner.on_update(ctx, state, dt)
    }

    fn on_tick(&mut self, ctx: &Context, state: &mut FrameCounter) -> Out<FrameCounter, ()> {
        self.inner.on_tick(ctx, state)
    }

    fn on_device_events(
        &mut self,
        ctx: &Context,
        state: &mut FrameCounter,
        event: &haunted_house::DeviceEvent,
    ) -> Out<FrameCounter, ()> {
        self.inner.on_device_events(ctx, state, event)
    }

    fn on_window_events(
        &mut self,
        ctx: &Context,
        state: &mut FrameCounter,
        event: &haunted_house::WindowEvent,
    ) -> Out<FrameCounter, ()> {
        self.inner.on_window_events(ctx, state, event)
    }

    fn on_custom_events(&mut self, ctx: &Context, state: &mut FrameCounter, event: ()) -> Option<()> {
        self.inner.on_custom_events(ctx, state, event)
    }

    fn on_render<'pass>(&self) -> Render<'_, 'pass> {
        self.inner.on_render()
    }

    fn render_to_texture(
        &self,
        ctx: &Context,
        state: &mut FrameCounter,
        frame: &mut image::RgbaImage,
    ) -> anyhow::Result<ImageTestResult> {
        (self.validate)(ctx, state, frame)
    }
}

/// A flow that renders nothing of its own.
pub(crate) struct Nothing;

#[cfg(feature = "integration-tests")]
impl GraphicsFlow<FrameCounter, ()> for Nothing {
    fn on_init(&mut self, _: &mut Context, _: &mut FrameCounter) -> Out<FrameCounter, ()> {
        Out::Empty
    }

    fn on_update(&mut self, _: &Context, _: &mut FrameCounter, _: std::time::Duration) -> Out<FrameCounter, ()> {
        Out::Empty
    }

    fn on_tick(&mut self, _: &Context, _: &mut FrameCounter) -> Out<FrameCounter, ()> {
        Out::Empty
    }

    fn on_device_events(&mut self, _: &Context, _: &mut FrameCounter, _: &haunted_house::DeviceEvent) -> Out<FrameCounter, ()> {
        Out::Empty
    }

    fn on_window_events(&mut self, _: &Context, _: &mut FrameCounter, _: &haunted_house::WindowEvent) -> Out<FrameCounter, ()> {
        Out::Empty
    }

    fn on_custom_events(&mut self, _: &Context, _: &mut FrameCounter, event: ()) -> Option<()> {
        Some(event)
    }

    fn on_render<'pass>(&self) -> Render<'_, 'pass> {
        Render::None
    }

    fn render_to_texture(&self, _: &Context, _: &mut FrameCounter, _: &mut image::RgbaImage) -> anyhow::Result<ImageTestResult> {
        Ok(ImageTestResult::Passed)
    }
}

/// Runs `constructor` in a window until every flow reports `Passed`.
#[cfg(feature = "integration-tests")]
pub(crate) fn run_inspected(constructor: FlowConstructor<FrameCounter, ()>, validate: Box<Validate>) {
    let inspected: FlowConstructor<FrameCounter, ()> = Box::new(move |init| {
        Box::pin(async move {
            let inner = constructor(init).await?;
            let flow: Box<dyn GraphicsFlow<FrameCounter, ()>> = Box::new(Inspected { inner, validate });
            anyhow::Ok(flow)
        })
    });
    haunted_house::flow::run(SceneConfig::default(), vec![inspected]).expect("Failed to run flow for integration test.");
}
