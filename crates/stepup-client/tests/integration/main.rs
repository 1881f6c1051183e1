mod helpers;

mod api_test;
