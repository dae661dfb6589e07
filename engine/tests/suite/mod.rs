mod lifecycle;
mod routing;
