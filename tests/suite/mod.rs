mod proxy;
mod sanitizer;
