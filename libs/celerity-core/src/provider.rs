//! Provider variants: the tagged description of how the container should
//! produce a value for a token (spec.md §3 "Provider", §4.A).

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::token::{ClassId, InjectionToken};

/// A type-erased, shareable instance held in the container's cache.
pub type Instance = Arc<dyn Any + Send + Sync>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A teardown callback, invoked with the instance it closes over.
/// Failures are swallowed by `Container::close_all` (spec.md §4.D).
pub type Closer = Arc<dyn Fn(Instance) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Constructs an instance from its already-resolved, positionally-ordered
/// dependency instances.
pub type ConstructFn =
    Arc<dyn Fn(Vec<Instance>) -> BoxFuture<'static, anyhow::Result<Instance>> + Send + Sync>;

/// A zero-argument constructor for a class with no declared dependencies,
/// submitted via `inventory::submit!` so the container can implicitly
/// construct the class even though nothing ever registered a provider for
/// it (spec.md §4.D "a class with zero constructor parameters may always
/// be implicitly constructed").
pub struct ImplicitConstructorRegistration {
    pub class: ClassId,
    pub construct: ConstructFn,
}

inventory::collect!(ImplicitConstructorRegistration);

/// Registers `T`'s `Default` implementation as its implicit,
/// zero-dependency constructor. Call this from a `#[module(...)]`-style
/// registrator or submit an `ImplicitConstructorRegistration` by hand for
/// types that build their default value some other way.
pub fn implicit_constructor<T: Default + Send + Sync + 'static>() -> ImplicitConstructorRegistration {
    ImplicitConstructorRegistration {
        class: ClassId::of::<T>(),
        construct: Arc::new(|_deps| Box::pin(async { Ok(Arc::new(T::default()) as Instance) })),
    }
}

/// Opt-in trait for types exposing one of the conventional teardown
/// operations the source framework detects by method name (`close`, `end`,
/// `quit`, `disconnect`, `$disconnect`, `destroy`, in that priority). Rust
/// has no runtime method-name reflection, so that priority list collapses
/// to a single canonical entry point: implement this trait and register
/// the provider through [`Provider::class_with_auto_close`] /
/// [`Provider::factory_with_auto_close`] / [`Provider::value_with_auto_close`]
/// to opt in (see DESIGN.md).
pub trait ConventionalCloser: Send + Sync {
    fn close(self: Arc<Self>) -> BoxFuture<'static, anyhow::Result<()>>;
}

fn closer_for<T: ConventionalCloser + 'static>() -> Closer {
    Arc::new(|instance: Instance| {
        Box::pin(async move {
            match instance.downcast::<T>() {
                Ok(typed) => typed.close().await,
                Err(_) => Ok(()),
            }
        })
    })
}

/// "Construct this class, injecting its declared dependencies."
#[derive(Clone)]
pub struct ClassProvider {
    pub class: ClassId,
    pub deps: Vec<InjectionToken>,
    pub construct: ConstructFn,
    pub on_close: Option<Closer>,
    /// Whether the class bears the injectability marker, gating implicit
    /// construction of multi-argument constructors (spec.md §4.D).
    pub injectable: bool,
}

/// "Invoke this function with resolved dependencies listed in `inject`."
#[derive(Clone)]
pub struct FactoryProvider {
    pub inject: Vec<InjectionToken>,
    pub construct: ConstructFn,
    pub on_close: Option<Closer>,
}

/// "Use this pre-built value."
#[derive(Clone)]
pub struct ValueProvider {
    pub value: Instance,
    pub on_close: Option<Closer>,
}

#[derive(Clone)]
pub enum Provider {
    Class(ClassProvider),
    Factory(FactoryProvider),
    Value(ValueProvider),
}

impl Provider {
    pub fn class<T: Send + Sync + 'static>(
        deps: Vec<InjectionToken>,
        injectable: bool,
        construct: ConstructFn,
    ) -> Self {
        Provider::Class(ClassProvider {
            class: ClassId::of::<T>(),
            deps,
            construct,
            on_close: None,
            injectable,
        })
    }

    pub fn class_with_auto_close<T: ConventionalCloser + 'static>(
        deps: Vec<InjectionToken>,
        injectable: bool,
        construct: ConstructFn,
    ) -> Self {
        Provider::Class(ClassProvider {
            class: ClassId::of::<T>(),
            deps,
            construct,
            on_close: Some(closer_for::<T>()),
            injectable,
        })
    }

    pub fn factory(inject: Vec<InjectionToken>, construct: ConstructFn) -> Self {
        Provider::Factory(FactoryProvider {
            inject,
            construct,
            on_close: None,
        })
    }

    pub fn factory_with_auto_close<T: ConventionalCloser + 'static>(
        inject: Vec<InjectionToken>,
        construct: ConstructFn,
    ) -> Self {
        Provider::Factory(FactoryProvider {
            inject,
            construct,
            on_close: Some(closer_for::<T>()),
        })
    }

    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        Provider::Value(ValueProvider {
            value: Arc::new(value),
            on_close: None,
        })
    }

    pub fn value_with_auto_close<T: ConventionalCloser + 'static>(value: T) -> Self {
        Provider::Value(ValueProvider {
            value: Arc::new(value) as Instance,
            on_close: Some(closer_for::<T>()),
        })
    }

    pub fn with_on_close(mut self, closer: Closer) -> Self {
        match &mut self {
            Provider::Class(p) => p.on_close = Some(closer),
            Provider::Factory(p) => p.on_close = Some(closer),
            Provider::Value(p) => p.on_close = Some(closer),
        }
        self
    }

    pub fn on_close(&self) -> Option<&Closer> {
        match self {
            Provider::Class(p) => p.on_close.as_ref(),
            Provider::Factory(p) => p.on_close.as_ref(),
            Provider::Value(p) => p.on_close.as_ref(),
        }
    }

    /// The provider's class dependencies, `inject` list, or empty,
    /// matching the dependency-token-extraction rule of spec.md §4.A.
    pub fn dependencies(&self) -> &[InjectionToken] {
        match self {
            Provider::Class(p) => &p.deps,
            Provider::Factory(p) => &p.inject,
            Provider::Value(_) => &[],
        }
    }

    /// The manifest's `providerType` discriminator (spec.md §6).
    pub fn provider_type(&self) -> &'static str {
        match self {
            Provider::Class(_) => "class",
            Provider::Factory(_) => "factory",
            Provider::Value(_) => "value",
        }
    }
}
