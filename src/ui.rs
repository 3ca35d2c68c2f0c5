use url::Url;

/// Where a successful upload sends the user next.
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &Url);
}

/// Blocking, user-visible failure notice.
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn navigate(&self, target: &Url) {
        println!("{}", target);
    }
}

pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn alert(&self, message: &str) {
        eprintln!("{}", message);
    }
}
